//! Patient-level orchestration of the normalization core.
//!
//! raw documents → name registry (pass 1) → redaction (pass 2) →
//! section extraction or course splitting → normalization → artifacts.
//!
//! Ingestion and persistence sit behind traits so a batch can run against
//! folders, row exports or an in-memory store alike.

use std::collections::BTreeMap;

use crate::config::NormalizeConfig;
use crate::models::{CanonicalArtifact, Category, Document, DocumentKind};
use crate::pipeline::course::RecordSplitter;
use crate::pipeline::deidentify::{Deidentifier, NameRegistry};
use crate::pipeline::ingest::{DocumentSource, IngestError};
use crate::pipeline::normalize::normalize;
use crate::pipeline::report::{ProcessingReport, SkipReason};
use crate::pipeline::sections::{extract_text, ExclusionRules};
use crate::pipeline::storage::ArtifactStore;

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Turns all documents of one patient into canonical artifacts.
pub struct PatientProcessor {
    deidentifier: Deidentifier,
    splitter: RecordSplitter,
    exclusions: ExclusionRules,
}

impl PatientProcessor {
    pub fn new(config: &NormalizeConfig) -> Self {
        let deidentifier = match &config.redaction_token {
            Some(token) => Deidentifier::with_token(token.clone()),
            None => Deidentifier::new(),
        };
        Self {
            deidentifier,
            splitter: RecordSplitter::new(config.course_format),
            exclusions: config.exclusions.clone(),
        }
    }

    /// Process one patient's complete document set.
    ///
    /// Every document is observed before any is redacted, so a name revealed
    /// only by a later document is still removed from earlier ones. Units that
    /// end up empty are dropped. Ordinals are assigned per category: a
    /// category with one artifact has none, several are numbered from 1.
    pub fn process_patient(&self, patient_id: &str, documents: &[Document]) -> Vec<CanonicalArtifact> {
        let mut registry = NameRegistry::new();
        for document in documents {
            self.deidentifier.observe(document.text(), &mut registry);
        }
        let names = registry.len();

        let mut units: BTreeMap<Category, Vec<String>> = BTreeMap::new();
        for document in documents {
            let (clean, updated) = self.deidentifier.redact(document.text(), registry);
            registry = updated;

            let kind = document.kind();
            let texts = self.shape(kind, &clean);
            tracing::debug!(kind = %kind, units = texts.len(), "Document shaped");
            units.entry(kind.category()).or_default().extend(texts);
        }

        let artifacts: Vec<CanonicalArtifact> = units
            .into_iter()
            .flat_map(|(category, texts)| {
                let numbered = texts.len() > 1;
                texts.into_iter().enumerate().map(move |(i, text)| CanonicalArtifact {
                    patient_id: patient_id.to_string(),
                    category,
                    ordinal: numbered.then_some(i + 1),
                    text,
                })
            })
            .collect();

        tracing::info!(
            patient_id = %patient_id,
            documents = documents.len(),
            names,
            artifacts = artifacts.len(),
            "Patient processed"
        );

        artifacts
    }

    /// Section extraction or record splitting, then normalization.
    fn shape(&self, kind: DocumentKind, text: &str) -> Vec<String> {
        match kind {
            DocumentKind::DailyProgress => self
                .splitter
                .split(text)
                .into_iter()
                .map(|record| record.text)
                .collect(),
            _ => {
                let body = normalize(&extract_text(text, self.exclusions.for_kind(kind)));
                if body.is_empty() {
                    Vec::new()
                } else {
                    vec![body]
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Batch driver
// ---------------------------------------------------------------------------

/// Load every patient from `source`, process, and persist through `store`.
///
/// Per-unit failures are recorded in the report and never abort the batch.
/// Only a source that cannot be read at all is an error.
pub fn run_batch(
    source: &dyn DocumentSource,
    store: &dyn ArtifactStore,
    processor: &PatientProcessor,
) -> Result<ProcessingReport, IngestError> {
    let mut report = ProcessingReport::new();
    tracing::info!(run_id = %report.run_id, source = %source.describe(), "Batch started");

    let batch = source.load()?;
    for unit in batch.skipped {
        report.skip(unit.unit, unit.reason, unit.detail);
    }

    for group in &batch.patients {
        report.patients += 1;
        report.documents += group.documents.len();

        let artifacts = processor.process_patient(&group.patient_id, &group.documents);
        if let Err(e) = store.clear_patient(&group.patient_id) {
            report.skip(group.patient_id.clone(), SkipReason::Storage, e.to_string());
            continue;
        }
        for artifact in artifacts {
            match store.save(&artifact) {
                Ok(_) => report.artifacts += 1,
                Err(e) => report.skip(
                    format!("{}/{}", artifact.patient_id, artifact.file_name()),
                    SkipReason::Storage,
                    e.to_string(),
                ),
            }
        }
    }

    tracing::info!(
        run_id = %report.run_id,
        patients = report.patients,
        documents = report.documents,
        artifacts = report.artifacts,
        skipped = report.skipped.len(),
        "Batch complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::pipeline::ingest::{IngestBatch, PatientDocuments};
    use crate::pipeline::patterns::TimestampFormat;
    use crate::pipeline::report::SkippedUnit;
    use crate::pipeline::storage::{FsArtifactStore, StorageError};

    fn doc(patient: &str, kind: DocumentKind, text: &str) -> Document {
        Document::new(patient, kind, text).unwrap()
    }

    fn processor() -> PatientProcessor {
        PatientProcessor::new(&NormalizeConfig::default())
    }

    #[test]
    fn admission_document_is_redacted_and_trimmed() {
        let admission = doc(
            "0001",
            DocumentKind::Admission,
            "姓名：张三\n性别：男\n发病节气：立夏\n\n\
             主诉：右膝疼痛3天\n\
             既往史：糖尿病10年\n\
             入院情况：一般情况可，体格检查：T 36.5 专科检查见右膝肿胀，既往否认药物过敏\n\
             张三\n",
        );
        let artifacts = processor().process_patient("0001", &[admission]);

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].category, Category::Admission);
        assert_eq!(artifacts[0].ordinal, None);
        assert_eq!(
            artifacts[0].text,
            "主诉：右膝疼痛3天\n入院情况：一般情况可，专科检查见右膝肿胀，"
        );
    }

    #[test]
    fn name_from_later_document_is_removed_from_earlier_one() {
        let documents = [
            doc("0001", DocumentKind::Admission, "现病史：患者由李四陪同就诊"),
            doc("0001", DocumentKind::Discharge, "出院情况：好转\n医师签名：李四 \n"),
        ];
        let artifacts = processor().process_patient("0001", &documents);
        assert!(artifacts.iter().all(|a| !a.text.contains("李四")));
        assert_eq!(artifacts[0].text, "现病史：患者由陪同就诊");
    }

    #[test]
    fn progress_note_becomes_numbered_daily_records() {
        let course = doc(
            "0001",
            DocumentKind::DailyProgress,
            "2022-07-09 09:12 主治医师查房记录\n患者右膝疼痛。\n2022-07-10 08:30 主治医师查房记录\n疼痛减轻。",
        );
        let artifacts = processor().process_patient("0001", &[course]);

        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(|a| a.category == Category::DailyCourse));
        assert_eq!(artifacts[0].ordinal, Some(1));
        assert_eq!(artifacts[1].ordinal, Some(2));
        assert_eq!(artifacts[1].file_name(), "daily_course-2.txt");
        assert!(artifacts[1].text.starts_with("2022-07-10 08:30"));
    }

    #[test]
    fn fully_excluded_document_yields_nothing() {
        let first_course = doc("0001", DocumentKind::FirstCourse, "病例分型：A型\n中医鉴别诊断：无");
        assert!(processor().process_patient("0001", &[first_course]).is_empty());
    }

    #[test]
    fn redaction_token_is_configurable() {
        let config = NormalizeConfig {
            redaction_token: Some("[NAME]".into()),
            ..Default::default()
        };
        let note = doc("0001", DocumentKind::Other, "会诊意见：同意\n王五\n王五已签字");
        let artifacts = PatientProcessor::new(&config).process_patient("0001", &[note]);
        assert!(artifacts[0].text.contains("[NAME]已签字"));
    }

    #[test]
    fn dotted_progress_note_merges_stamp_with_title_before_splitting() {
        let config = NormalizeConfig {
            course_format: TimestampFormat::Dotted,
            ..Default::default()
        };
        let course = doc(
            "0001",
            DocumentKind::DailyProgress,
            "2021.10.10 08:11\n主治医师查房记录\n患者由王五陪同，右膝疼痛\n\
             2021.10.11 08:30\n主任医师查房记录\n疼痛减轻\n王五\n",
        );
        let artifacts = PatientProcessor::new(&config).process_patient("0001", &[course]);

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].ordinal, Some(1));
        assert_eq!(artifacts[1].ordinal, Some(2));
        assert!(artifacts[0].text.starts_with("2021.10.10 08:11"));
        assert!(artifacts[1].text.starts_with("2021.10.11 08:30"));
        assert!(artifacts[0].text.contains("主治医师查房记录"));
        assert!(artifacts.iter().all(|a| !a.text.contains("王五")));
    }

    struct StaticSource(Vec<PatientDocuments>, Vec<SkippedUnit>);

    impl DocumentSource for StaticSource {
        fn describe(&self) -> String {
            "static".into()
        }

        fn load(&self) -> Result<IngestBatch, IngestError> {
            Ok(IngestBatch {
                patients: self.0.clone(),
                skipped: self.1.clone(),
            })
        }
    }

    /// Store that refuses one patient and records the rest in memory.
    struct FlakyStore {
        refuse: &'static str,
        saved: RefCell<Vec<CanonicalArtifact>>,
    }

    impl ArtifactStore for FlakyStore {
        fn save(&self, artifact: &CanonicalArtifact) -> Result<PathBuf, StorageError> {
            if artifact.patient_id == self.refuse {
                return Err(StorageError::InvalidPatientId(artifact.patient_id.clone()));
            }
            self.saved.borrow_mut().push(artifact.clone());
            Ok(PathBuf::from(artifact.file_name()))
        }

        fn clear_patient(&self, _patient_id: &str) -> Result<usize, StorageError> {
            Ok(0)
        }

        fn patients(&self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }

        fn load_patient(&self, patient_id: &str) -> Result<Vec<CanonicalArtifact>, StorageError> {
            Err(StorageError::PatientNotFound(patient_id.into()))
        }
    }

    #[test]
    fn batch_isolates_failures_per_unit() {
        let source = StaticSource(
            vec![
                PatientDocuments {
                    patient_id: "bad".into(),
                    documents: vec![doc("bad", DocumentKind::Discharge, "出院情况：好转")],
                },
                PatientDocuments {
                    patient_id: "0002".into(),
                    documents: vec![doc("0002", DocumentKind::Discharge, "出院情况：好转")],
                },
            ],
            vec![SkippedUnit {
                unit: "rows.jsonl:3".into(),
                reason: SkipReason::MissingIdentifier,
                detail: "Missing patient identifier".into(),
            }],
        );
        let store = FlakyStore {
            refuse: "bad",
            saved: RefCell::new(Vec::new()),
        };

        let report = run_batch(&source, &store, &processor()).unwrap();

        assert_eq!(report.patients, 2);
        assert_eq!(report.documents, 2);
        assert_eq!(report.artifacts, 1);
        assert_eq!(report.skipped_for(SkipReason::Storage), 1);
        assert_eq!(report.skipped_for(SkipReason::MissingIdentifier), 1);
        assert_eq!(store.saved.borrow()[0].patient_id, "0002");
    }

    #[test]
    fn batch_writes_to_filesystem_store() {
        let out = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(out.path());
        let source = StaticSource(
            vec![PatientDocuments {
                patient_id: "0001".into(),
                documents: vec![
                    doc("0001", DocumentKind::Admission, "主诉：右膝疼痛3天"),
                    doc("0001", DocumentKind::Discharge, "出院情况：好转"),
                ],
            }],
            Vec::new(),
        );

        let report = run_batch(&source, &store, &processor()).unwrap();
        assert_eq!(report.artifacts, 2);
        let written = std::fs::read_to_string(out.path().join("0001").join("admission.txt")).unwrap();
        assert_eq!(written, "主诉：右膝疼痛3天");
    }

    #[test]
    fn rerun_replaces_previous_artifacts() {
        let out = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(out.path());
        let course = |text: &str| {
            StaticSource(
                vec![PatientDocuments {
                    patient_id: "0001".into(),
                    documents: vec![doc("0001", DocumentKind::DailyProgress, text)],
                }],
                Vec::new(),
            )
        };

        let first = course("2022-07-09 09:12 查房记录\n旧记录一\n2022-07-10 08:30 查房记录\n旧记录二");
        assert_eq!(run_batch(&first, &store, &processor()).unwrap().artifacts, 2);

        let second = course("2022-07-11 10:00 查房记录\n右膝疼痛新记录");
        assert_eq!(run_batch(&second, &store, &processor()).unwrap().artifacts, 1);

        let loaded = store.load_patient("0001").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].ordinal, None);
        assert!(loaded[0].text.contains("新记录"));
    }
}

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(DocumentKind {
    Admission => "admission",
    Discharge => "discharge",
    FirstCourse => "first_course",
    DailyProgress => "daily_progress",
    Other => "other",
});

str_enum!(Category {
    Admission => "admission",
    FirstCourse => "first_course",
    DailyCourse => "daily_course",
    Discharge => "discharge",
    Other => "other",
});

impl DocumentKind {
    /// Map a hospital export file stem (`入院`, `出院`, `首程`, `病程`) to its kind.
    /// Anything unrecognised is `Other`.
    pub fn from_file_stem(stem: &str) -> Self {
        match stem {
            "入院" => Self::Admission,
            "出院" => Self::Discharge,
            "首程" => Self::FirstCourse,
            "病程" => Self::DailyProgress,
            _ => Self::Other,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Admission => Category::Admission,
            Self::Discharge => Category::Discharge,
            Self::FirstCourse => Category::FirstCourse,
            Self::DailyProgress => Category::DailyCourse,
            Self::Other => Category::Other,
        }
    }
}

impl Category {
    /// Record order used whenever a patient's artifacts are laid out together.
    pub const ORDER: [Category; 5] = [
        Category::Admission,
        Category::FirstCourse,
        Category::DailyCourse,
        Category::Discharge,
        Category::Other,
    ];

    /// Chinese record heading for this category.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admission => "入院记录",
            Self::FirstCourse => "首次病程记录",
            Self::DailyCourse => "日常病程记录",
            Self::Discharge => "出院记录",
            Self::Other => "其他记录",
        }
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub type TaskId = String;

/// Override parameters accepted by `Task::generate`. Keys are task specific.
pub type TaskParams = HashMap<String, String>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    UsersGroups,
    Permissions,
    Lvm,
    Filesystems,
    Networking,
    Selinux,
    Services,
    Boot,
    Processes,
    Scheduling,
    Containers,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::UsersGroups,
        Category::Permissions,
        Category::Lvm,
        Category::Filesystems,
        Category::Networking,
        Category::Selinux,
        Category::Services,
        Category::Boot,
        Category::Processes,
        Category::Scheduling,
        Category::Containers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsersGroups => "users_groups",
            Self::Permissions => "permissions",
            Self::Lvm => "lvm",
            Self::Filesystems => "filesystems",
            Self::Networking => "networking",
            Self::Selinux => "selinux",
            Self::Services => "services",
            Self::Boot => "boot",
            Self::Processes => "processes",
            Self::Scheduling => "scheduling",
            Self::Containers => "containers",
        }
    }

    /// Exam objective the category maps to.
    pub fn objective(&self) -> &'static str {
        match self {
            Self::UsersGroups => "Manage users and groups",
            Self::Permissions => "Manage security (permissions, ACLs)",
            Self::Lvm => "Configure local storage (LVM)",
            Self::Filesystems => "Create and configure file systems",
            Self::Networking => "Deploy, configure, and maintain systems (networking)",
            Self::Selinux => "Manage security (SELinux)",
            Self::Services => "Deploy, configure, and maintain systems (services)",
            Self::Boot => "Manage system boot process",
            Self::Processes => "Manage processes",
            Self::Scheduling => "Schedule tasks",
            Self::Containers => "Manage containers",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseVocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseVocabularyError::Category(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Exam,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Exam, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Exam => "exam",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ParseVocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "exam" => Ok(Self::Exam),
            "hard" => Ok(Self::Hard),
            other => Err(ParseVocabularyError::Difficulty(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseVocabularyError {
    #[error("unknown category: {0}")]
    Category(String),
    #[error("unknown difficulty: {0}")]
    Difficulty(String),
}

/// Identity and presentation of a task instance. Concrete tasks keep their
/// generated parameters next to this in their own fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMeta {
    pub id: TaskId,
    pub category: Category,
    pub difficulty: Difficulty,
    pub points: u32,
    pub description: String,
    pub hints: Vec<String>,
}

impl TaskMeta {
    pub fn new(id: impl Into<String>, category: Category, difficulty: Difficulty, points: u32) -> Self {
        Self {
            id: id.into(),
            category,
            difficulty,
            points,
            description: String::new(),
            hints: Vec::new(),
        }
    }
}

impl fmt::Display for TaskMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Task {}: {} ({}, {}pts)>",
            self.id, self.category, self.difficulty, self.points
        )
    }
}

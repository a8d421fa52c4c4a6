use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Entity {
    Grade,
    ClassRoom,
    Student,
    Professor,
    Course,
    Note,
    Payment,
    Scholarship,
    Attendance,
    Homework,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Flag,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
}

const fn col(name: &'static str, kind: ColumnKind, required: bool) -> Column {
    Column {
        name,
        kind,
        required,
    }
}

const GRADE_COLUMNS: &[Column] = &[col("name", ColumnKind::Text, true)];
const CLASS_ROOM_COLUMNS: &[Column] = &[
    col("name", ColumnKind::Text, true),
    col("gradeId", ColumnKind::Integer, true),
];
const STUDENT_COLUMNS: &[Column] = &[
    col("lastName", ColumnKind::Text, true),
    col("firstName", ColumnKind::Text, true),
    col("birthDate", ColumnKind::Text, false),
    col("gradeId", ColumnKind::Integer, true),
    col("classRoomId", ColumnKind::Integer, false),
];
const PROFESSOR_COLUMNS: &[Column] = &[
    col("lastName", ColumnKind::Text, true),
    col("firstName", ColumnKind::Text, true),
    col("email", ColumnKind::Text, false),
];
const COURSE_COLUMNS: &[Column] = &[
    col("name", ColumnKind::Text, true),
    col("coefficient", ColumnKind::Real, false),
    col("gradeId", ColumnKind::Integer, true),
    col("professorId", ColumnKind::Integer, false),
];
const NOTE_COLUMNS: &[Column] = &[
    col("value", ColumnKind::Real, true),
    col("studentId", ColumnKind::Integer, true),
    col("courseId", ColumnKind::Integer, true),
];
const PAYMENT_COLUMNS: &[Column] = &[
    col("amount", ColumnKind::Real, true),
    col("paidOn", ColumnKind::Text, false),
    col("studentId", ColumnKind::Integer, true),
];
const SCHOLARSHIP_COLUMNS: &[Column] = &[
    col("label", ColumnKind::Text, true),
    col("amount", ColumnKind::Real, true),
    col("studentId", ColumnKind::Integer, true),
];
const ATTENDANCE_COLUMNS: &[Column] = &[
    col("day", ColumnKind::Text, true),
    col("present", ColumnKind::Flag, true),
    col("studentId", ColumnKind::Integer, true),
];
const HOMEWORK_COLUMNS: &[Column] = &[
    col("title", ColumnKind::Text, true),
    col("dueOn", ColumnKind::Text, false),
    col("courseId", ColumnKind::Integer, false),
    col("classRoomId", ColumnKind::Integer, false),
];

impl Entity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grade" => Some(Self::Grade),
            "classRoom" => Some(Self::ClassRoom),
            "student" => Some(Self::Student),
            "professor" => Some(Self::Professor),
            "course" => Some(Self::Course),
            "note" => Some(Self::Note),
            "payment" => Some(Self::Payment),
            "scholarship" => Some(Self::Scholarship),
            "attendance" => Some(Self::Attendance),
            "homework" => Some(Self::Homework),
            _ => None,
        }
    }

    /// Name shown to the user in delete messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Grade => "Grade",
            Self::ClassRoom => "ClassRoom",
            Self::Student => "Student",
            Self::Professor => "Professor",
            Self::Course => "Course",
            Self::Note => "Note",
            Self::Payment => "Payment",
            Self::Scholarship => "Scholarship",
            Self::Attendance => "Attendance",
            Self::Homework => "Homework",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Grade => "grade",
            Self::ClassRoom => "class_room",
            Self::Student => "T_student",
            Self::Professor => "professor",
            Self::Course => "course",
            Self::Note => "note",
            Self::Payment => "payment",
            Self::Scholarship => "scholarship",
            Self::Attendance => "attendance",
            Self::Homework => "homework",
        }
    }

    /// Writable columns, excluding `id` and `created_at`.
    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::Grade => GRADE_COLUMNS,
            Self::ClassRoom => CLASS_ROOM_COLUMNS,
            Self::Student => STUDENT_COLUMNS,
            Self::Professor => PROFESSOR_COLUMNS,
            Self::Course => COURSE_COLUMNS,
            Self::Note => NOTE_COLUMNS,
            Self::Payment => PAYMENT_COLUMNS,
            Self::Scholarship => SCHOLARSHIP_COLUMNS,
            Self::Attendance => ATTENDANCE_COLUMNS,
            Self::Homework => HOMEWORK_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.name == name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One dependent relation of an entity: rows of `dependent_table` whose
/// `foreign_key_column` holds the target id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRule {
    pub dependent_table: String,
    pub foreign_key_column: String,
    pub cascade: bool,
}

impl RelationRule {
    /// Dependent rows are deleted along with the target.
    pub fn cascade(table: &str, column: &str) -> Self {
        Self {
            dependent_table: table.to_string(),
            foreign_key_column: column.to_string(),
            cascade: true,
        }
    }

    /// Any dependent row blocks the delete.
    pub fn restrict(table: &str, column: &str) -> Self {
        Self {
            dependent_table: table.to_string(),
            foreign_key_column: column.to_string(),
            cascade: false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("duplicate relation {table}.{column} on {entity}")]
    Duplicate {
        entity: Entity,
        table: String,
        column: String,
    },

    #[error("{entity} cannot declare a relation on its own table")]
    SelfReference { entity: Entity },
}

pub fn validate_identifier(s: &str) -> Result<(), RuleError> {
    let mut chars = s.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RuleError::InvalidIdentifier(s.to_string()));
    }
    Ok(())
}

/// Checks that both names of `rule` are plain SQL identifiers.
pub fn validate_rule(rule: &RelationRule) -> Result<(), RuleError> {
    validate_identifier(&rule.dependent_table)?;
    validate_identifier(&rule.foreign_key_column)
}

/// Relation rules per entity. Rules are checked when registered so the
/// validator can trust them at delete time.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    rules: HashMap<Entity, Vec<RelationRule>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rule list of `entity`. On error the registry is unchanged.
    pub fn register(&mut self, entity: Entity, rules: Vec<RelationRule>) -> Result<(), RuleError> {
        for (i, rule) in rules.iter().enumerate() {
            validate_rule(rule)?;
            if rule.dependent_table == entity.table() {
                return Err(RuleError::SelfReference { entity });
            }
            let dup = rules[..i].iter().any(|r| {
                r.dependent_table == rule.dependent_table
                    && r.foreign_key_column == rule.foreign_key_column
            });
            if dup {
                return Err(RuleError::Duplicate {
                    entity,
                    table: rule.dependent_table.clone(),
                    column: rule.foreign_key_column.clone(),
                });
            }
        }
        self.rules.insert(entity, rules);
        Ok(())
    }

    pub fn rules(&self, entity: Entity) -> &[RelationRule] {
        self.rules.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The relations of the school workspace schema created by `db::init_schema`.
    pub fn school() -> Result<Self, RuleError> {
        let mut reg = Self::new();
        reg.register(
            Entity::Grade,
            vec![
                RelationRule::cascade("class_room", "gradeId"),
                RelationRule::restrict("T_student", "gradeId"),
                RelationRule::restrict("course", "gradeId"),
            ],
        )?;
        reg.register(
            Entity::ClassRoom,
            vec![
                RelationRule::cascade("homework", "classRoomId"),
                RelationRule::restrict("T_student", "classRoomId"),
            ],
        )?;
        reg.register(
            Entity::Student,
            vec![
                RelationRule::cascade("note", "studentId"),
                RelationRule::cascade("attendance", "studentId"),
                RelationRule::restrict("payment", "studentId"),
                RelationRule::restrict("scholarship", "studentId"),
            ],
        )?;
        reg.register(
            Entity::Professor,
            vec![RelationRule::restrict("course", "professorId")],
        )?;
        reg.register(
            Entity::Course,
            vec![
                RelationRule::cascade("homework", "courseId"),
                RelationRule::restrict("note", "courseId"),
            ],
        )?;
        Ok(reg)
    }
}

//! Fortune lot records.

use serde::{Deserialize, Serialize};

/// A single fortune lot as stored in the lots resource.
///
/// Records are read-only; the service never mutates or persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortuneLot {
    pub id: i64,

    /// Display number, e.g. "第一籤".
    pub number: String,

    /// Fortune grade, e.g. "上上".
    pub level: String,

    pub title: String,

    pub poem: String,

    /// Historical story the lot alludes to.
    #[serde(default)]
    pub story: String,

    pub meaning: String,

    pub explanation: String,
}

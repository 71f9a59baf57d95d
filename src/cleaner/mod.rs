//! Cleaning core: rows → normalized rows → duplicate groups → cleaned dataset + report.
//!
//! Nothing in here touches files or databases.

pub mod classify;
pub mod dedupe;
pub mod normalize;
pub mod pipeline;
pub mod report;

pub use classify::{classify, Issue, NormalizedRow};
pub use dedupe::{resolve, DuplicateGroup};
pub use normalize::{normalize, IssueKind, Normalized};
pub use pipeline::run;
pub use report::{ChangeReport, ColumnHealth, ColumnTally, RemovedRow};

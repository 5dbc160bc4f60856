

pub mod classifier;
pub mod corpus;
pub mod groups;
pub mod taxonomy;

pub use classifier::{Classification, SectorClassifier};
pub use corpus::CorpusSelector;
pub use groups::{ReportingGroup, ReportingGroupTable, SpecialGroup};
pub use taxonomy::TaxonomyCode;

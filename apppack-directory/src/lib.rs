//! AppPack Directory
//!
//! Read side of the resource directory: a key-value table indexing owned
//! stacks by cluster, used to offer pickers and to resolve cross-resource
//! references.

pub mod backends;
pub mod directory;
pub mod table;

pub use backends::{DynamoTable, MemoryTable, create_table};
pub use directory::{AppSettings, ClusterMember, Directory, DirectoryEntry, DirectoryError};
pub use table::{KeyValueTable, TableConfig, TableError, TableResult};

pub mod archive_resolver;
pub mod package_validator;

pub use archive_resolver::resolve_archive;
pub use package_validator::validate_package;

pub mod os;
pub mod paths;
pub mod permissions;

pub use os::Os;
pub use permissions::make_executable;

mod builtin;
mod default_executor;
mod executor;
mod path_resolver;
mod pipeline;
mod redirect;


pub use builtin::{BuiltinCommand, BuiltinContext, BuiltinManager};
pub use default_executor::DefaultExecutor;
pub use executor::{normalize_status, report, ExecError, ExecStatus, Executor};
pub use path_resolver::{PathResolver, DEFAULT_PATH};
pub use redirect::{Input, IoContext, Output, Stream};

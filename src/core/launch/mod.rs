pub mod classpath;
pub mod command;
pub mod supervisor;

pub use classpath::{build_classpath, classpath_entries, get_classpath_separator};
pub use command::{build_command, CommandLine};
pub use supervisor::{
    FileLogSink, LaunchOutcome, LogSink, LogStream, SupervisedProcess, Supervisor, TracingLogSink,
};

pub mod apps;
pub mod exec;
pub mod job;
pub mod kv;
pub mod map;
pub mod merge;
pub mod names;
pub mod reduce;
pub mod results;
pub mod sequential;
pub mod task;
pub mod worker;

pub use apps::{app_by_name, MapReduceApp, WordCount};
pub use job::{JobContext, JobId, JobInfo, JobRequest, JobStatus};
pub use kv::KeyValue;
pub use results::JobResults;
pub use task::{DoTaskArgs, DoTaskReply, Phase, TaskState};
pub use worker::{WorkerId, WorkerInfo, WorkerRegisterRequest, WorkerRegisterResponse};

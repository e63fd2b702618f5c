pub mod preview_jobs;

use crate::error::{PipelineError, Result};

/// Flags the execution engine understands. Every other pass-through
/// argument is carried verbatim and left alone.
const WORKER_FLAGS: &[&str] = &["--workers", "--direct_num_workers"];

/// Execution-engine configuration built from the arguments the CLI did not claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub workers: Option<usize>,
    pub args: Vec<String>,
}

impl EngineOptions {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut workers = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value.to_string())),
                None => (arg.as_str(), None),
            };
            if !WORKER_FLAGS.contains(&flag) {
                continue;
            }
            let value = match inline {
                Some(v) => v,
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| PipelineError::Engine(format!("{flag} needs a value")))?,
            };
            workers = Some(parse_workers(flag, &value)?);
        }
        Ok(Self {
            workers,
            args: args.to_vec(),
        })
    }

    /// Pass-through arguments this engine does not interpret.
    pub fn unrecognized(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut skip_value = false;
        for arg in &self.args {
            if skip_value {
                skip_value = false;
                continue;
            }
            let flag = arg.split_once('=').map_or(arg.as_str(), |(f, _)| f);
            if WORKER_FLAGS.contains(&flag) {
                skip_value = !arg.contains('=');
                continue;
            }
            out.push(arg.as_str());
        }
        out
    }

    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("planload-worker-{i}"));
        if let Some(n) = self.workers {
            builder = builder.num_threads(n);
        }
        builder.build().map_err(|e| PipelineError::Engine(e.to_string()))
    }
}

fn parse_workers(flag: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(PipelineError::Engine(format!("{flag}: '{value}' is not a positive number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_args() {
        let opts = EngineOptions::from_args(&[]).unwrap();
        assert_eq!(opts, EngineOptions::default());
    }

    #[test]
    fn test_workers_forms() {
        assert_eq!(EngineOptions::from_args(&args(&["--workers", "3"])).unwrap().workers, Some(3));
        assert_eq!(EngineOptions::from_args(&args(&["--workers=5"])).unwrap().workers, Some(5));
        assert_eq!(
            EngineOptions::from_args(&args(&["--direct_num_workers=2"])).unwrap().workers,
            Some(2)
        );
    }

    #[test]
    fn test_args_kept_verbatim() {
        let raw = args(&["--runner=DirectRunner", "--workers", "2", "--project", "mktg"]);
        let opts = EngineOptions::from_args(&raw).unwrap();
        assert_eq!(opts.args, raw);
        assert_eq!(opts.unrecognized(), vec!["--runner=DirectRunner", "--project", "mktg"]);
    }

    #[test]
    fn test_bad_worker_counts() {
        assert!(EngineOptions::from_args(&args(&["--workers", "0"])).is_err());
        assert!(EngineOptions::from_args(&args(&["--workers=many"])).is_err());
        assert!(EngineOptions::from_args(&args(&["--workers"])).is_err());
    }

    #[test]
    fn test_build_pool_honors_workers() {
        let opts = EngineOptions::from_args(&args(&["--workers=2"])).unwrap();
        assert_eq!(opts.build_pool().unwrap().current_num_threads(), 2);
    }
}

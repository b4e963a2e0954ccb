use crate::executor::{ExecutorFactory, QueryExecutor};
use std::ops::Deref;
use std::sync::{Arc, Mutex};

/// Reuses executors across workers. Connections are checked out for the
/// duration of one query and go back on drop, including during unwinding.
#[derive(Clone)]
pub struct ExecutorPool {
    factory: Arc<dyn ExecutorFactory>,
    idle: Arc<Mutex<Vec<Box<dyn QueryExecutor>>>>,
}

impl ExecutorPool {
    pub fn new(factory: Arc<dyn ExecutorFactory>) -> Self {
        Self {
            factory,
            idle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn acquire(&self) -> anyhow::Result<PooledExecutor> {
        let reused = self.idle.lock().unwrap().pop();
        let exec = match reused {
            Some(e) => e,
            None => self.factory.connect()?,
        };
        Ok(PooledExecutor {
            exec: Some(exec),
            idle: self.idle.clone(),
        })
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }
}

pub struct PooledExecutor {
    exec: Option<Box<dyn QueryExecutor>>,
    idle: Arc<Mutex<Vec<Box<dyn QueryExecutor>>>>,
}

impl Deref for PooledExecutor {
    type Target = dyn QueryExecutor;

    fn deref(&self) -> &Self::Target {
        // Only taken in Drop.
        self.exec.as_deref().expect("executor present until drop")
    }
}

impl Drop for PooledExecutor {
    fn drop(&mut self) {
        if let Some(e) = self.exec.take() {
            if let Ok(mut idle) = self.idle.lock() {
                idle.push(e);
            }
        }
    }
}

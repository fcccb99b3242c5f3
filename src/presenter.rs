use crate::db;
use crate::types::Car;
use log::{error, info};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// Consumer of the verified set, refreshed after every completed tick.
pub trait Presenter: Send + Sync {
    fn refresh(&self, verified: &[Car]);
}

impl Presenter for Vec<Box<dyn Presenter>> {
    fn refresh(&self, verified: &[Car]) {
        for presenter in self {
            presenter.refresh(verified);
        }
    }
}

/// Logs each verified car the first time it appears.
#[derive(Debug, Default)]
pub struct LogPresenter {
    shown: Mutex<HashSet<String>>,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> usize {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Presenter for LogPresenter {
    fn refresh(&self, verified: &[Car]) {
        let mut shown = self.shown.lock().unwrap_or_else(|e| e.into_inner());
        for car in verified {
            let description = car.description();
            if shown.insert(description.clone()) {
                info!("Confirmed plate: {}", description);
            }
        }
    }
}

/// Persists verified cars so the confirmed set outlives the process.
pub struct SqlitePresenter {
    inner: Mutex<SqliteInner>,
}

struct SqliteInner {
    conn: Connection,
    saved: HashSet<String>,
}

impl SqlitePresenter {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = db::open(path)?;
        let saved = db::verified_plates(&conn)?.into_iter().collect();
        Ok(SqlitePresenter {
            inner: Mutex::new(SqliteInner { conn, saved }),
        })
    }
}

impl Presenter for SqlitePresenter {
    fn refresh(&self, verified: &[Car]) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let SqliteInner { conn, saved } = &mut *inner;
        for car in verified {
            if saved.contains(&car.reg_number) {
                continue;
            }
            match db::record_verified(conn, car) {
                Ok(_) => {
                    saved.insert(car.reg_number.clone());
                }
                Err(e) => error!(
                    "Unable to save verified plate {}: {:?}",
                    car.reg_number, e
                ),
            }
        }
    }
}

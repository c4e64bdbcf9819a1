use crate::model::Link;
use anyhow::Result;

pub trait Source {
    fn scan(&self) -> Result<Vec<Link>>;
}

pub mod linkfile;
pub mod opk;
pub mod sections;
pub mod apps;

use std::path::PathBuf;

pub struct DataPaths {
    pub root: PathBuf,
    pub jobs: PathBuf,
    pub resumes: PathBuf,
    pub index_db: PathBuf,
}

impl DataPaths {
    pub fn new() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_root(root)
    }

    pub fn from_root(root: PathBuf) -> Self {
        let data = root.join("data");
        Self {
            jobs: data.join("jobs"),
            resumes: data.join("resumes"),
            index_db: data.join("index.db"),
            root,
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new()
    }
}

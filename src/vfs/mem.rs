use super::{normalize, DirEntry, EntryKind, Stat, Vfs};
use crate::error::VfsError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

/// In-memory implementation used by tests and the CLI's scratch mode.
/// Grounded on the teacher's preference for a pure-data state snapshot
/// (`OrchestrationState`) rather than touching real disk in unit tests.
pub struct MemVfs {
    nodes: Mutex<BTreeMap<String, Node>>,
}

impl Default for MemVfs {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), Node::Dir);
        Self {
            nodes: Mutex::new(nodes),
        }
    }
}

impl MemVfs {
    pub fn new() -> Self {
        Self::default()
    }

    fn parent_exists_as_dir(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some((parent, _)) => matches!(nodes.get(parent), Some(Node::Dir)),
            None => true,
        }
    }
}

#[async_trait]
impl Vfs for MemVfs {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        let path = normalize(path);
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(&path) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            Some(Node::Dir) => Err(VfsError::NotAFile(path)),
            None => Err(VfsError::NotFound(path)),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), VfsError> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(VfsError::NotAFile(path));
        }
        let mut nodes = self.nodes.lock().unwrap();
        if !Self::parent_exists_as_dir(&nodes, &path) {
            return Err(VfsError::NotFound(
                path.rsplit_once('/').map(|(p, _)| p).unwrap_or("").into(),
            ));
        }
        if matches!(nodes.get(&path), Some(Node::Dir)) {
            return Err(VfsError::NotAFile(path));
        }
        nodes.insert(path, Node::File(data.to_vec()));
        Ok(())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, VfsError> {
        let path = normalize(path);
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(&path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(VfsError::NotADirectory(path)),
            None if path.is_empty() => {}
            None => return Err(VfsError::NotFound(path)),
        }
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for (candidate, node) in nodes.iter() {
            let Some(rest) = candidate.strip_prefix(&prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let name = rest.split('/').next().unwrap().to_string();
            if !seen.insert(name.clone()) {
                continue;
            }
            let is_direct_file = rest == name;
            let kind = if is_direct_file {
                match node {
                    Node::File(_) => EntryKind::File,
                    Node::Dir => EntryKind::Dir,
                }
            } else {
                EntryKind::Dir
            };
            out.push(DirEntry { name, kind });
        }
        Ok(out)
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), VfsError> {
        let path = normalize(path);
        let mut nodes = self.nodes.lock().unwrap();
        if !recursive && !Self::parent_exists_as_dir(&nodes, &path) {
            return Err(VfsError::NotFound(path));
        }
        if recursive {
            let mut acc = String::new();
            for seg in path.split('/') {
                if seg.is_empty() {
                    continue;
                }
                if !acc.is_empty() {
                    acc.push('/');
                }
                acc.push_str(seg);
                nodes.entry(acc.clone()).or_insert(Node::Dir);
            }
        } else {
            nodes.insert(path, Node::Dir);
        }
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Stat, VfsError> {
        let path = normalize(path);
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(&path) {
            Some(Node::File(bytes)) => Ok(Stat {
                is_file: true,
                is_dir: false,
                size: bytes.len() as u64,
                mtime_ms: 0,
            }),
            Some(Node::Dir) => Ok(Stat {
                is_file: false,
                is_dir: true,
                size: 0,
                mtime_ms: 0,
            }),
            None if path.is_empty() => Ok(Stat {
                is_file: false,
                is_dir: true,
                size: 0,
                mtime_ms: 0,
            }),
            None => Err(VfsError::NotFound(path)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), VfsError> {
        let from = normalize(from);
        let to = normalize(to);
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.remove(&from).ok_or(VfsError::NotFound(from))?;
        nodes.insert(to, node);
        Ok(())
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> Result<(), VfsError> {
        let path = normalize(path);
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(&path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(VfsError::NotADirectory(path)),
            None => return Err(VfsError::NotFound(path)),
        }
        let prefix = format!("{path}/");
        let has_children = nodes.keys().any(|k| k.starts_with(&prefix));
        if has_children && !recursive {
            return Err(VfsError::NotEmpty(path));
        }
        nodes.retain(|k, _| k != &path && !k.starts_with(&prefix));
        Ok(())
    }

    async fn unlink(&self, path: &str) -> Result<(), VfsError> {
        let path = normalize(path);
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.remove(&path) {
            Some(Node::File(_)) => Ok(()),
            Some(Node::Dir) => {
                nodes.insert(path.clone(), Node::Dir);
                Err(VfsError::NotAFile(path))
            }
            None => Err(VfsError::NotFound(path)),
        }
    }
}

//! In-memory MicroPython board for integration tests
//!
//! Recognises the filesystem snippets by their bodies, reads the bound
//! arguments from the preamble and answers like a real board would.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mpyfs_communication::{BoardFs, ConnectionParams, DeviceClient, DeviceReply, SimulatedDevice};
use mpyfs_core::ProtocolTiming;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Files and directories of the fake board
#[derive(Debug, Default)]
pub struct FakeFs {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    /// Paths whose removal fails
    pub locked: BTreeSet<String>,
}

fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

impl FakeFs {
    pub fn new() -> Self {
        let mut fs = Self::default();
        fs.dirs.insert("/".to_string());
        fs
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        self.files.insert(path.to_string(), data.to_vec());
    }

    pub fn add_dir(&mut self, path: &str) {
        self.dirs.insert(path.to_string());
    }

    fn children(&self, dir: &str) -> Vec<(String, bool)> {
        let mut out: Vec<(String, bool)> = self
            .dirs
            .iter()
            .filter(|d| d.as_str() != "/" && parent_of(d) == dir)
            .map(|d| (d.clone(), true))
            .chain(
                self.files
                    .keys()
                    .filter(|f| parent_of(f) == dir)
                    .map(|f| (f.clone(), false)),
            )
            .collect();
        out.sort();
        out
    }

    fn name(path: &str) -> String {
        path.rsplit('/').next().unwrap_or_default().to_string()
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path)
    }

    fn remove_file(&mut self, path: &str) -> Result<(), String> {
        if self.locked.contains(path) {
            return Err("EACCES".to_string());
        }
        self.files.remove(path).map(|_| ()).ok_or_else(|| "ENOENT".to_string())
    }

    fn rmdir(&mut self, path: &str) -> Result<(), String> {
        if self.locked.contains(path) {
            return Err("EACCES".to_string());
        }
        if !self.children(path).is_empty() {
            return Err("ENOTEMPTY".to_string());
        }
        if self.dirs.remove(path) {
            Ok(())
        } else {
            Err("ENOENT".to_string())
        }
    }

    /// Children removed depth-first; returns (deleted, errors)
    fn rmrf(&mut self, path: &str) -> (u64, Vec<String>) {
        let mut deleted = 0;
        let mut errors = Vec::new();
        for (child, is_dir) in self.children(path) {
            if is_dir {
                let (d, e) = self.rmrf(&child);
                deleted += d;
                errors.extend(e);
                match self.rmdir(&child) {
                    Ok(()) => deleted += 1,
                    Err(e) => errors.push(format!("rmdir:{}:{}", child, e)),
                }
            } else {
                match self.remove_file(&child) {
                    Ok(()) => deleted += 1,
                    Err(e) => errors.push(format!("remove:{}:{}", child, e)),
                }
            }
        }
        (deleted, errors)
    }

    fn walk(&self, path: &str, out: &mut Vec<serde_json::Value>) {
        for (child, is_dir) in self.children(path) {
            let size = self.files.get(&child).map(|d| d.len()).unwrap_or(0);
            out.push(json!({"path": child, "isDir": is_dir, "size": size, "mtime": 0}));
            if is_dir {
                self.walk(&child, out);
            }
        }
    }

    /// Answer one submitted program
    pub fn answer(&mut self, program: &str) -> String {
        let args = bindings(program);
        let arg = |name: &str| args.get(name).cloned().unwrap_or_default();
        let p = arg("p");

        if program.contains("a2b_base64") {
            let dst = arg("dst");
            let mut parent = String::new();
            for part in parent_of(&dst).split('/').filter(|s| !s.is_empty()) {
                parent = format!("{}/{}", parent, part);
                self.dirs.insert(parent.clone());
            }
            return match STANDARD.decode(arg("B64")) {
                Ok(data) => {
                    self.files.insert(dst, data);
                    "ok".to_string()
                }
                Err(e) => format!("error:{}", e),
            };
        }
        if program.contains("b2a_base64") {
            return match self.files.get(&p) {
                Some(data) => format!("{}\n", STANDARD.encode(data)),
                None => "![Errno 2] ENOENT".to_string(),
            };
        }
        if program.contains("os.rename(tmp,dst)") {
            let (tmp, dst) = (arg("tmp"), arg("dst"));
            self.files.remove(&dst);
            return match self.files.remove(&tmp) {
                Some(data) => {
                    self.files.insert(dst, data);
                    "ok".to_string()
                }
                None => "error:[Errno 2] ENOENT".to_string(),
            };
        }
        if program.contains("os.rename(src,dst)") {
            let (src, dst) = (arg("src"), arg("dst"));
            return match self.files.remove(&src) {
                Some(data) => {
                    self.files.insert(dst, data);
                    "ok".to_string()
                }
                None => "error:[Errno 2] ENOENT".to_string(),
            };
        }
        if program.contains("'not_exists'") {
            return if self.exists(&p) { "exists" } else { "not_exists" }.to_string();
        }
        if program.contains("access=") {
            if self.dirs.contains(&p) {
                return "16384|0|dir|ro".to_string();
            }
            return match self.files.get(&p) {
                Some(data) => format!("32768|{}|file|ro", data.len()),
                None => "error:[Errno 2] ENOENT".to_string(),
            };
        }
        if program.contains("'mtime'") {
            let mut out = Vec::new();
            self.walk(&p, &mut out);
            return serde_json::Value::Array(out).to_string();
        }
        if program.contains("'deleted_count'") {
            let (deleted, errors) = self.rmrf(&p);
            return json!({"deleted_count": deleted, "error_count": errors.len(), "errors": errors})
                .to_string();
        }
        if program.contains("'is_dir':isd") {
            let is_dir = self.dirs.contains(&p);
            let (mut deleted, mut errors) = if is_dir { self.rmrf(&p) } else { (0, Vec::new()) };
            let removed = if is_dir { self.rmdir(&p) } else { self.remove_file(&p) };
            match removed {
                Ok(()) => deleted += 1,
                Err(e) => errors.push(format!("remove:{}:{}", p, e)),
            }
            return json!({"ok": errors.is_empty(), "is_dir": is_dir, "deleted": deleted, "errors": errors})
                .to_string();
        }
        if program.contains("delete_recursive(p)") {
            let (_, mut errors) = self.rmrf(&p);
            if let Err(e) = self.rmdir(&p) {
                errors.push(format!("rmdir:{}:{}", p, e));
            }
            return if errors.is_empty() {
                "deleted".to_string()
            } else {
                format!("errors:{}", errors.join(";"))
            };
        }
        if program.contains("error:still_exists") {
            return match self.remove_file(&p) {
                Ok(()) => "deleted".to_string(),
                Err(e) => format!("error:OSError_{}", e),
            };
        }
        if program.contains("rmrf(p)\nprint(M0+'ok'") {
            self.rmrf(&p);
            return "ok".to_string();
        }
        if program.contains("'isDir':isdir") {
            let entries: Vec<_> = self
                .children(&p)
                .into_iter()
                .map(|(path, is_dir)| json!({"name": Self::name(&path), "isDir": is_dir}))
                .collect();
            return serde_json::Value::Array(entries).to_string();
        }
        if program.contains("json.dumps(os.listdir(p))") {
            let names: Vec<_> = self.children(&p).into_iter().map(|(path, _)| Self::name(&path)).collect();
            return json!(names).to_string();
        }
        if program.contains("os.mkdir(p)") {
            self.dirs.insert(p);
            return "ok".to_string();
        }
        if program.contains("os.remove(p)") {
            let _ = self.remove_file(&p);
            return "ok".to_string();
        }

        String::new()
    }
}

/// Read `name="value"` bindings from a snippet preamble
pub fn bindings(program: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in program.lines() {
        let Some((name, literal)) = line.split_once('=') else {
            continue;
        };
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || !literal.starts_with('"')
            || !literal.ends_with('"')
            || literal.len() < 2
        {
            continue;
        }
        out.insert(name.to_string(), unescape(&literal[1..literal.len() - 1]));
    }
    out
}

fn unescape(inner: &str) -> String {
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(v) = u8::from_str_radix(&hex, 16) {
                    out.push(v as char);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// A simulated device backed by `fs`
pub fn fake_device(name: &str, fs: Arc<Mutex<FakeFs>>) -> SimulatedDevice {
    SimulatedDevice::new(name, move |program| {
        let payload = fs.lock().answer(program);
        if payload.is_empty() {
            DeviceReply::silent()
        } else {
            DeviceReply::marker(&payload)
        }
    })
}

/// Fast timing with a short marker deadline
pub fn test_timing() -> ProtocolTiming {
    ProtocolTiming::fast().with_marker_deadline(Duration::from_millis(200))
}

/// A board filesystem over a fresh fake board
pub fn fake_board() -> (BoardFs, SimulatedDevice, Arc<Mutex<FakeFs>>) {
    let fs = Arc::new(Mutex::new(FakeFs::new()));
    let device = fake_device("/dev/ttyFAKE0", fs.clone());
    let client = DeviceClient::new(
        Arc::new(device.clone()),
        ConnectionParams::new(device.name()),
        test_timing(),
    );
    (BoardFs::new(client), device, fs)
}

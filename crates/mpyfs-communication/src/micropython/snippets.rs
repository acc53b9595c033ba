//! MicroPython snippet builder
//!
//! Produces the device-side programs for every filesystem operation. Each
//! program starts with a short preamble binding its arguments and the
//! marker tags (`M0`, `M1`), followed by a fixed body. Bodies use
//! one-space indentation to keep submissions small.

use crate::raw_repl::{Decoding, MarkerCodec, Snippet};

/// Quote `value` as a MicroPython string literal
pub fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

const JSON_IMPORT: &str = "try:\n import ujson as json\nexcept:\n import json\n";

const IS_DIR_FN: &str = r#"DIR=0x4000
def isdir(x):
 try:
  return (os.stat(x)[0]&DIR)!=0
 except:
  return False
"#;

const LIST_NAMES_BODY: &str = r#"try:
 print(M0+json.dumps(os.listdir(p))+M1,end='')
except Exception as e:
 print(M0+'[]'+M1,end='')
"#;

const LIST_ENTRIES_BODY: &str = r#"sep='' if p.endswith('/') else '/'
out=[]
try:
 for n in os.listdir(p):
  isdir=False
  try:
   isdir=(os.stat(p+sep+n)[0]&0x4000)!=0
  except:
   pass
  out.append({'name':n,'isDir':isdir})
 print(M0+json.dumps(out)+M1,end='')
except Exception as e:
 print(M0+'[]'+M1,end='')
"#;

const MKDIR_BODY: &str = r#"try:
 os.mkdir(p)
except Exception:
 pass
print(M0+'ok'+M1,end='')
"#;

const REMOVE_BODY: &str = r#"try:
 os.remove(p)
except Exception:
 pass
print(M0+'ok'+M1,end='')
"#;

const CLEAR_TREE_BODY: &str = r#"def rmrf(x):
 try:
  for n in os.listdir(x):
   fp=x+('' if x.endswith('/') else '/')+n
   if isdir(fp):
    rmrf(fp)
    try:
     os.rmdir(fp)
    except:
     pass
   else:
    try:
     os.remove(fp)
    except:
     pass
 except:
  pass
rmrf(p)
print(M0+'ok'+M1,end='')
"#;

const DELETE_FILE_BODY: &str = r#"try:
 os.stat(p)
 os.remove(p)
 try:
  os.stat(p)
  print(M0+'error:still_exists'+M1,end='')
 except OSError:
  print(M0+'deleted'+M1,end='')
except OSError as e:
 errno=getattr(e,'errno',None) or (e.args[0] if e.args else 'unknown')
 print(M0+'error:OSError_'+str(errno)+'_'+str(e)+M1,end='')
except Exception as e:
 print(M0+'error:'+type(e).__name__+'_'+str(e)+M1,end='')
"#;

const DELETE_FOLDER_BODY: &str = r#"errors=[]
def delete_recursive(path):
 try:
  for item in os.listdir(path):
   item_path=path+item if path.endswith('/') else path+'/'+item
   try:
    if (os.stat(item_path)[0]&0x4000)!=0:
     delete_recursive(item_path)
    else:
     try:
      os.remove(item_path)
     except Exception as e:
      errors.append('remove:'+item_path+':'+str(e))
   except Exception as e:
    errors.append('stat:'+item_path+':'+str(e))
  try:
   os.rmdir(path)
  except Exception as e:
   errors.append('rmdir:'+path+':'+str(e))
 except Exception as e:
  errors.append('listdir:'+path+':'+str(e))
delete_recursive(p)
if errors:
 print(M0+'errors:'+';'.join(errors)+M1,end='')
else:
 print(M0+'deleted'+M1,end='')
"#;

const DOWNLOAD_BODY: &str = r#"import ubinascii
try:
 f=open(p,'rb')
 d=f.read()
 f.close()
 print(M0+ubinascii.b2a_base64(d).decode()+M1,end='')
except Exception as e:
 print(M0+'!'+str(e)+M1,end='')
"#;

const UPLOAD_BODY: &str = r#"import ubinascii
i=dst.rfind('/')
pp=''
for x in (dst[:i] if i>0 else '').split('/'):
 if not x:
  continue
 pp=pp+'/'+x
 try:
  os.mkdir(pp)
 except:
  pass
try:
 data=ubinascii.a2b_base64(B64)
 f=open(dst,'wb')
 f.write(data)
 f.close()
 print(M0+'ok'+M1,end='')
except Exception as e:
 print(M0+'error:'+str(e)+M1,end='')
"#;

const REPLACE_BODY: &str = r#"try:
 os.remove(dst)
except:
 pass
try:
 os.rename(tmp,dst)
 print(M0+'ok'+M1,end='')
except Exception as e:
 print(M0+'error:'+str(e)+M1,end='')
"#;

const RENAME_BODY: &str = r#"try:
 os.rename(src,dst)
 print(M0+'ok'+M1,end='')
except Exception as e:
 print(M0+'error:'+str(e)+M1,end='')
"#;

const STAT_BODY: &str = r#"try:
 st=os.stat(p)
 mode=st[0]
 size=st[6] if len(st)>6 else 0
 kind='dir' if (mode&0x4000)!=0 else 'file'
 access='ro' if (mode&0x0080)==0 else 'rw'
 print(M0+str(mode)+'|'+str(size)+'|'+kind+'|'+access+M1,end='')
except Exception as e:
 print(M0+'error:'+str(e)+M1,end='')
"#;

const EXISTS_BODY: &str = r#"try:
 os.stat(p)
 print(M0+'exists'+M1,end='')
except Exception:
 print(M0+'not_exists'+M1,end='')
"#;

const TREE_BODY: &str = r#"out=[]
def walk(x):
 try:
  for n in os.listdir(x):
   fp=x+('' if x.endswith('/') else '/')+n
   try:
    st=os.stat(fp)
    mode=st[0]
    size=st[6] if len(st)>6 else 0
    mtime=st[8] if len(st)>8 else 0
    d=(mode&DIR)!=0
    out.append({'path':fp,'isDir':d,'size':size,'mtime':mtime})
    if d:
     walk(fp)
   except:
    pass
 except:
  pass
walk(p)
print(M0+json.dumps(out)+M1,end='')
"#;

const RMRF_COUNTING_FN: &str = r#"errors=[]
deleted=0
def rmrf(x):
 global deleted
 try:
  for n in os.listdir(x):
   fp=x+('' if x.endswith('/') else '/')+n
   if isdir(fp):
    rmrf(fp)
    try:
     os.rmdir(fp)
     deleted+=1
    except Exception as e:
     errors.append('rmdir:'+fp+':'+str(e))
   else:
    try:
     os.remove(fp)
     deleted+=1
    except Exception as e:
     errors.append('remove:'+fp+':'+str(e))
 except Exception as e:
  errors.append('list:'+x+':'+str(e))
"#;

const WIPE_BODY: &str = r#"try:
 os.listdir(p)
 rmrf(p)
except Exception as e:
 errors.append('list_root:'+p+':'+str(e))
print(M0+json.dumps({'deleted_count':deleted,'error_count':len(errors),'errors':errors})+M1,end='')
"#;

const DELETE_ANY_BODY: &str = r#"isd=isdir(p)
if isd:
 rmrf(p)
 try:
  os.rmdir(p)
  deleted+=1
 except Exception as e:
  errors.append('rmdir:'+p+':'+str(e))
else:
 try:
  os.remove(p)
  deleted+=1
 except Exception as e:
  errors.append('remove:'+p+':'+str(e))
print(M0+json.dumps({'ok':len(errors)==0,'is_dir':isd,'deleted':deleted,'errors':errors})+M1,end='')
"#;

/// Builds snippets framed with a codec's marker tags
#[derive(Debug, Clone)]
pub struct SnippetBuilder {
    start: String,
    end: String,
}

impl Default for SnippetBuilder {
    fn default() -> Self {
        Self::new(&MarkerCodec::default())
    }
}

impl SnippetBuilder {
    /// Create a builder printing `codec`'s tags
    pub fn new(codec: &MarkerCodec) -> Self {
        Self {
            start: codec.start_tag().to_string(),
            end: codec.end_tag().to_string(),
        }
    }

    fn compose(&self, bindings: &[(&str, &str)], parts: &[&str]) -> String {
        let mut body = String::from("import os\n");
        body.push_str(&format!("M0={}\nM1={}\n", py_str(&self.start), py_str(&self.end)));
        for (name, value) in bindings {
            body.push_str(&format!("{}={}\n", name, py_str(value)));
        }
        for part in parts {
            body.push_str(part);
        }
        body
    }

    /// Plain names in a directory, as a JSON list
    pub fn list_names(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("p", path)], &[JSON_IMPORT, LIST_NAMES_BODY]),
            Decoding::Json,
        )
    }

    /// Names with directory flags
    pub fn list_entries(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("p", path)], &[JSON_IMPORT, LIST_ENTRIES_BODY]),
            Decoding::Entries,
        )
    }

    /// Create one directory, ignoring failures
    pub fn mkdir(&self, path: &str) -> Snippet {
        Snippet::expect(self.compose(&[("p", path)], &[MKDIR_BODY]), Decoding::Status)
    }

    /// Remove one file, ignoring failures
    pub fn remove(&self, path: &str) -> Snippet {
        Snippet::expect(self.compose(&[("p", path)], &[REMOVE_BODY]), Decoding::Status)
    }

    /// Remove everything below a directory, keeping the directory
    pub fn clear_tree(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("p", path)], &[IS_DIR_FN, CLEAR_TREE_BODY]),
            Decoding::Status,
        )
    }

    /// Remove one file and verify it is gone
    pub fn delete_file(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("p", path)], &[DELETE_FILE_BODY]),
            Decoding::Status,
        )
    }

    /// Remove a directory and its content, collecting per-entry failures
    pub fn delete_folder_recursive(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("p", path)], &[DELETE_FOLDER_BODY]),
            Decoding::Status,
        )
    }

    /// Read a file as base64; failures come back as `!<message>`
    pub fn download(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("p", path)], &[DOWNLOAD_BODY]),
            Decoding::Binary,
        )
    }

    /// Write `data` to `dst`, creating missing parent directories
    pub fn upload(&self, data: &[u8], dst: &str) -> Snippet {
        let encoded = MarkerCodec::encode_binary(data);
        Snippet::expect(
            self.compose(&[("dst", dst), ("B64", &encoded)], &[UPLOAD_BODY]),
            Decoding::Status,
        )
    }

    /// Move `tmp` over `dst`, removing `dst` first
    pub fn replace(&self, tmp: &str, dst: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("tmp", tmp), ("dst", dst)], &[REPLACE_BODY]),
            Decoding::Status,
        )
    }

    /// Rename or move a file or directory
    pub fn rename(&self, src: &str, dst: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("src", src), ("dst", dst)], &[RENAME_BODY]),
            Decoding::Status,
        )
    }

    /// `mode|size|dir|ro` for a path
    pub fn stat(&self, path: &str) -> Snippet {
        Snippet::expect(self.compose(&[("p", path)], &[STAT_BODY]), Decoding::Status)
    }

    /// `exists` or `not_exists`
    pub fn exists(&self, path: &str) -> Snippet {
        Snippet::expect(self.compose(&[("p", path)], &[EXISTS_BODY]), Decoding::Status)
    }

    /// Recursive walk with sizes and modification times
    pub fn tree(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(&[("p", path)], &[JSON_IMPORT, IS_DIR_FN, TREE_BODY]),
            Decoding::Json,
        )
    }

    /// Delete all children of a directory in one round trip
    pub fn wipe_path(&self, root: &str) -> Snippet {
        Snippet::expect(
            self.compose(
                &[("p", root)],
                &[JSON_IMPORT, IS_DIR_FN, RMRF_COUNTING_FN, WIPE_BODY],
            ),
            Decoding::Json,
        )
    }

    /// Delete a file, or a directory with everything in it
    pub fn delete_any(&self, path: &str) -> Snippet {
        Snippet::expect(
            self.compose(
                &[("p", path)],
                &[JSON_IMPORT, IS_DIR_FN, RMRF_COUNTING_FN, DELETE_ANY_BODY],
            ),
            Decoding::Json,
        )
    }

    /// A user program, output returned verbatim
    pub fn program(&self, code: &str) -> Snippet {
        Snippet::program(code)
    }
}

//! Wordlist corpus
//!
//! Wordlists are split ahead of time into numbered shards, one job per shard.
//! On disk a corpus root holds one directory per wordlist:
//!
//! ```text
//! <root>/rockyou/rockyou_0.txt
//! <root>/rockyou/rockyou_1.txt
//! ...
//! ```
//!
//! [`split_wordlist`] produces that layout from a single wordlist file.

use hashbrown::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::CorpusError;

/// Read-only source of wordlist shards
pub trait WordlistCorpus: Send + Sync {
    /// Every wordlist with its shard count, sorted by name
    fn wordlists(&self) -> Result<Vec<(String, u32)>, CorpusError>;

    /// Candidates of one shard, in file order
    fn shard(&self, name: &str, index: u32) -> Result<Vec<String>, CorpusError>;
}

/// File name of shard `index` of wordlist `name`
pub fn shard_file_name(name: &str, index: u32) -> String {
    format!("{}_{}.txt", name, index)
}

fn parse_shard(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

// ----------------------------------------------------------------------------
// Directory Corpus
// ----------------------------------------------------------------------------

/// Corpus backed by a directory of pre-split shard files
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
}

impl DirectoryCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_path(&self, name: &str, index: u32) -> PathBuf {
        self.root.join(name).join(shard_file_name(name, index))
    }

    /// Shards are numbered from zero without gaps; counting stops at the
    /// first missing index.
    fn count_shards(&self, name: &str) -> u32 {
        let mut count = 0;
        while self.shard_path(name, count).is_file() {
            count += 1;
        }
        count
    }
}

impl WordlistCorpus for DirectoryCorpus {
    fn wordlists(&self) -> Result<Vec<(String, u32)>, CorpusError> {
        if !self.root.is_dir() {
            warn!(root = %self.root.display(), "Wordlist directory missing, no wordlist jobs");
            return Ok(Vec::new());
        }

        let mut wordlists = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let shards = self.count_shards(&name);
            if shards > 0 {
                debug!(wordlist = %name, shards, "Found wordlist");
                wordlists.push((name, shards));
            }
        }
        wordlists.sort();
        Ok(wordlists)
    }

    fn shard(&self, name: &str, index: u32) -> Result<Vec<String>, CorpusError> {
        let path = self.shard_path(name, index);
        if !path.is_file() {
            let count = self.count_shards(name);
            if count == 0 {
                return Err(CorpusError::UnknownWordlist {
                    name: name.to_string(),
                });
            }
            return Err(CorpusError::ShardOutOfRange {
                name: name.to_string(),
                index,
                count,
            });
        }
        let contents = fs::read_to_string(path)?;
        Ok(parse_shard(&contents))
    }
}

// ----------------------------------------------------------------------------
// In-Memory Corpus
// ----------------------------------------------------------------------------

/// Corpus held in memory, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    wordlists: HashMap<String, Vec<Vec<String>>>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a wordlist cut into shards of `chunk_size` words
    pub fn with_wordlist<I, S>(mut self, name: &str, words: I, chunk_size: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        let shards = words
            .chunks(chunk_size.max(1))
            .map(<[String]>::to_vec)
            .collect();
        self.wordlists.insert(name.to_string(), shards);
        self
    }
}

impl WordlistCorpus for InMemoryCorpus {
    fn wordlists(&self) -> Result<Vec<(String, u32)>, CorpusError> {
        let mut wordlists: Vec<(String, u32)> = self
            .wordlists
            .iter()
            .map(|(name, shards)| (name.clone(), shards.len() as u32))
            .collect();
        wordlists.sort();
        Ok(wordlists)
    }

    fn shard(&self, name: &str, index: u32) -> Result<Vec<String>, CorpusError> {
        let shards = self
            .wordlists
            .get(name)
            .ok_or_else(|| CorpusError::UnknownWordlist {
                name: name.to_string(),
            })?;
        shards
            .get(index as usize)
            .cloned()
            .ok_or(CorpusError::ShardOutOfRange {
                name: name.to_string(),
                index,
                count: shards.len() as u32,
            })
    }
}

// ----------------------------------------------------------------------------
// Shard Producer
// ----------------------------------------------------------------------------

/// Split a wordlist file into shards of `chunk_size` words.
///
/// Shards are written to `<out_dir>/<stem>/<stem>_<i>.txt`, so `out_dir` can be
/// used directly as a [`DirectoryCorpus`] root. Lines that are not valid ASCII
/// are skipped; a `chunk_size` of zero is treated as one. Returns the paths
/// written, in shard order.
pub fn split_wordlist(
    input: &Path,
    chunk_size: usize,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, CorpusError> {
    let name = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| CorpusError::UnknownWordlist {
            name: input.display().to_string(),
        })?
        .to_string();

    let raw = fs::read(input)?;
    let words: Vec<&str> = raw
        .split(|&byte| byte == b'\n')
        .filter(|line| line.is_ascii())
        .filter_map(|line| core::str::from_utf8(line).ok())
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .collect();

    let target = out_dir.join(&name);
    fs::create_dir_all(&target)?;

    let mut written = Vec::new();
    for (index, chunk) in words.chunks(chunk_size.max(1)).enumerate() {
        let path = target.join(shard_file_name(&name, index as u32));
        let mut contents = chunk.join("\n");
        contents.push('\n');
        fs::write(&path, contents)?;
        written.push(path);
    }

    debug!(wordlist = %name, words = words.len(), shards = written.len(), "Split wordlist");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("crackpool-{}-{}", label, uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_in_memory_corpus() {
        let corpus = InMemoryCorpus::new()
            .with_wordlist("tiny", ["a", "b", "c", "d", "e"], 2)
            .with_wordlist("alpha", ["x"], 10);

        assert_eq!(
            corpus.wordlists().unwrap(),
            vec![("alpha".to_string(), 1), ("tiny".to_string(), 3)]
        );
        assert_eq!(corpus.shard("tiny", 2).unwrap(), vec!["e".to_string()]);
        assert!(matches!(
            corpus.shard("tiny", 3),
            Err(CorpusError::ShardOutOfRange { count: 3, .. })
        ));
        assert!(matches!(
            corpus.shard("missing", 0),
            Err(CorpusError::UnknownWordlist { .. })
        ));
    }

    #[test]
    fn test_split_then_read_back() {
        let dir = scratch_dir("split");
        let input = dir.join("leaked.txt");
        let mut raw = b"password\n123456\n  qwerty  \n\nlet\xffmein\ns3cr3t\n".to_vec();
        raw.extend_from_slice(b"dragon\n");
        fs::write(&input, raw).unwrap();

        let root = dir.join("wordlists");
        let shards = split_wordlist(&input, 2, &root).unwrap();
        assert_eq!(shards.len(), 3);
        assert!(shards[0].ends_with("leaked/leaked_0.txt"));

        let corpus = DirectoryCorpus::new(&root);
        assert_eq!(corpus.wordlists().unwrap(), vec![("leaked".to_string(), 3)]);
        assert_eq!(
            corpus.shard("leaked", 0).unwrap(),
            vec!["password".to_string(), "123456".to_string()]
        );
        assert_eq!(
            corpus.shard("leaked", 1).unwrap(),
            vec!["qwerty".to_string(), "s3cr3t".to_string()]
        );
        assert!(matches!(
            corpus.shard("leaked", 9),
            Err(CorpusError::ShardOutOfRange { count: 3, .. })
        ));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_root_has_no_wordlists() {
        let corpus = DirectoryCorpus::new("/nonexistent/crackpool/wordlists");
        assert!(corpus.wordlists().unwrap().is_empty());
    }
}

//! Verify command implementation.

use super::CliError;
use chainstore_codec::from_cbor;
use chainstore_core::log::{CommitReader, Fault, Header, Mutation, HEADER_SIZE};
use chainstore_core::CoreResult;
use chainstore_storage::{FileAccess, FileBackend, StorageBackend};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of valid commits.
    pub commits: u64,
    /// Number of mutations in valid commits.
    pub mutations: u64,
    /// Put values that failed to decode.
    pub bad_values: Vec<String>,
    /// Where replay stopped early, if it did.
    pub fault: Option<Fault>,
    /// End of the last valid commit.
    pub valid_end: u64,
    /// File size.
    pub file_size: u64,
}

impl VerifyResult {
    /// Returns `true` if the file would open.
    pub fn is_usable(&self) -> bool {
        self.bad_values.is_empty() && (self.fault.is_none() || self.commits > 0)
    }

    /// Returns `true` if every byte of the file is a valid commit.
    pub fn is_clean(&self) -> bool {
        self.is_usable() && self.fault.is_none()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, list_commits: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {}", path.display());
    println!();

    let backend = FileBackend::open_with(path, FileAccess::ReadOnly)?;
    let result = verify_log(&backend, list_commits)?;
    print_result(&result);

    println!();
    if result.is_clean() {
        println!("✓ Store verification passed");
        Ok(())
    } else if result.is_usable() {
        println!("! Store is damaged but opens at its last valid checkpoint");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err(CliError::VerificationFailed("store cannot be opened".to_string()).into())
    }
}

/// Walks every commit of the log, decoding all values.
pub fn verify_log(backend: &dyn StorageBackend, list_commits: bool) -> CoreResult<VerifyResult> {
    let header = Header::decode(&backend.read_at(0, HEADER_SIZE)?)?;
    let mut reader = CommitReader::new(backend, &header)?;
    let mut result = VerifyResult {
        file_size: reader.file_size(),
        ..VerifyResult::default()
    };

    while !reader.at_end() {
        let offset = reader.position();
        let commit = match reader.next_commit()? {
            Ok(commit) => commit,
            Err(reason) => {
                result.fault = Some(Fault { offset, reason });
                break;
            }
        };

        if list_commits {
            println!(
                "  {} <- {}  {} mutations",
                commit.checkpoint,
                commit.previous,
                commit.mutations.len()
            );
        }
        for mutation in &commit.mutations {
            if let Mutation::Put { key, value } = mutation {
                if let Err(err) = from_cbor(value) {
                    result.bad_values.push(format!(
                        "{} in commit {}: {err}",
                        String::from_utf8_lossy(key),
                        commit.checkpoint
                    ));
                }
            }
        }
        result.commits += 1;
        result.mutations += commit.mutations.len() as u64;
    }

    result.valid_end = reader.position();
    Ok(result)
}

fn print_result(result: &VerifyResult) {
    println!("Commits:");
    println!("  Valid commits:    {}", result.commits);
    println!("  Mutations:        {}", result.mutations);
    println!("  Valid end:        {:#x}", result.valid_end);
    println!("  File size:        {:#x}", result.file_size);

    if let Some(fault) = &result.fault {
        println!("  Stopped at:       {fault}");
    }
    if !result.bad_values.is_empty() {
        println!("  Undecodable values:");
        for bad in result.bad_values.iter().take(10) {
            println!("    - {bad}");
        }
        if result.bad_values.len() > 10 {
            println!("    ... and {} more", result.bad_values.len() - 10);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstore_core::{Config, OpenMode, Store, Value};
    use chainstore_storage::InMemoryBackend;

    fn store_with_commits(n: i64) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        let config = Config::new().page_size(0).lock_file(false);
        let mut store =
            Store::open_with_backend(Box::new(backend.share()), OpenMode::CreateAndWrite, config)
                .unwrap();
        for i in 0..n {
            store.put(format!("k{i}").as_bytes(), &Value::Integer(i)).unwrap();
            store.commit_changes().unwrap();
        }
        backend
    }

    #[test]
    fn clean_log() {
        let backend = store_with_commits(3);
        let result = verify_log(&backend, false).unwrap();
        assert_eq!(result.commits, 3);
        assert_eq!(result.mutations, 3);
        assert!(result.is_clean());
        assert_eq!(result.valid_end, result.file_size);
    }

    #[test]
    fn damaged_tail_is_usable() {
        let mut backend = store_with_commits(2);
        backend.append(&[0xde, 0xad]).unwrap();

        let result = verify_log(&backend, false).unwrap();
        assert_eq!(result.commits, 2);
        assert!(result.fault.is_some());
        assert!(result.is_usable());
        assert!(!result.is_clean());
    }

    #[test]
    fn broken_first_commit_is_unusable() {
        let backend = store_with_commits(1);
        let last = backend.data().len() as u64 - 1;
        backend.poke(last, 0x00).unwrap();

        let result = verify_log(&backend, false).unwrap();
        assert_eq!(result.commits, 0);
        assert!(!result.is_usable());
    }
}

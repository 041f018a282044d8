//! gix-backed revision resolution.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::GitOid;

pub fn rev_parse(repo: &GixRepo, spec: &str) -> Result<GitOid, GitError> {
    rev_parse_opt(repo, spec)?.ok_or_else(|| GitError::NotFound {
        message: format!("revision `{spec}` did not resolve to an object"),
    })
}

pub fn rev_parse_opt(repo: &GixRepo, spec: &str) -> Result<Option<GitOid>, GitError> {
    match repo.repo.rev_parse_single(spec) {
        Ok(id) => {
            let bytes: [u8; 20] = id
                .detach()
                .as_bytes()
                .try_into()
                .expect("SHA1 is 20 bytes");
            Ok(Some(GitOid::from_bytes(bytes)))
        }
        Err(e) => {
            let message = e.to_string();
            if message.contains("not found") || message.contains("unknown") {
                Ok(None)
            } else {
                Err(GitError::BackendError { message })
            }
        }
    }
}

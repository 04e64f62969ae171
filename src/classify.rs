//! Heuristics that label a pull request as a revert and by the part of the codebase it touched.

use crate::config::RepoId;
use crate::models::{PrFile, PullRequest};
use once_cell::sync::Lazy;
use regex::Regex;

pub const SERVICES_PREFIX: &str = "services/";
pub const LIBRARIES_PREFIX: &str = "libraries/";
pub const PACKAGES_PREFIX: &str = "packages/";

// GitHub's revert button writes "Reverts owner/repo#123" into the body and pushes a
// `revert-123-<branch>` head branch.
static REVERTS_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Reverts\s+([\w.-]+)/[\w.-]+#\d+").expect("valid regex"));
static REVERT_BRANCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"revert-\d+").expect("valid regex"));

/// Whether the pull request undoes an earlier change.
///
/// Unmerged pull requests are never reverts. Otherwise the title, the body and the head branch
/// are checked in that order and the first hit wins. The body reference must point at a
/// repository owned by the pull request's own owner.
pub fn is_revert(pr: &PullRequest) -> bool {
    if !pr.is_merged() {
        return false;
    }

    if pr.title.to_lowercase().contains("revert") {
        return true;
    }

    if let Some(body) = &pr.body {
        let same_owner = REVERTS_BODY
            .captures_iter(body)
            .any(|caps| caps[1] == pr.repo.owner);
        if same_owner {
            return true;
        }
    }

    REVERT_BRANCH.is_match(&pr.head_ref)
}

/// Whether the pull request belongs to the engine repository, judged by its URL.
pub fn is_engine_pr(pr: &PullRequest, engine: Option<&RepoId>) -> bool {
    engine.is_some_and(|repo| pr.url.contains(&format!("{}/{}/", repo.owner, repo.repo)))
}

fn touches(files: &[PrFile], prefix: &str) -> bool {
    files.iter().any(|file| file.filename.starts_with(prefix))
}

pub fn is_services_pr(files: &[PrFile]) -> bool {
    touches(files, SERVICES_PREFIX)
}

pub fn is_library_pr(files: &[PrFile]) -> bool {
    touches(files, LIBRARIES_PREFIX)
}

pub fn is_package_pr(files: &[PrFile]) -> bool {
    touches(files, PACKAGES_PREFIX)
}

/// Module flags for one pull request. An engine pull request never carries path flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModuleFlags {
    pub engine: bool,
    pub services: bool,
    pub library: bool,
    pub package: bool,
}

impl ModuleFlags {
    pub fn classify(pr: &PullRequest, files: &[PrFile], engine: Option<&RepoId>) -> Self {
        if is_engine_pr(pr, engine) {
            return Self {
                engine: true,
                ..Self::default()
            };
        }

        Self {
            engine: false,
            services: is_services_pr(files),
            library: is_library_pr(files),
            package: is_package_pr(files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn pr(repo: &str, title: &str) -> PullRequest {
        PullRequest {
            repo: RepoId::new("acme", repo),
            number: 7,
            url: format!("https://api.github.com/repos/acme/{}/pulls/7", repo),
            html_url: format!("https://github.com/acme/{}/pull/7", repo),
            title: title.to_string(),
            body: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            merged_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
            head_ref: "feature/login".to_string(),
        }
    }

    fn file(name: &str) -> PrFile {
        PrFile {
            filename: name.to_string(),
            additions: 1,
            deletions: 0,
            changes: 1,
        }
    }

    #[test]
    fn test_revert_by_title_is_case_insensitive() {
        assert!(is_revert(&pr("services", "REVERT: broken login")));
        assert!(is_revert(&pr("services", "Unrevertable fix")));
        assert!(!is_revert(&pr("services", "Fix login")));
    }

    #[test]
    fn test_unmerged_pr_is_never_a_revert() {
        let mut unmerged = pr("services", "Revert foo");
        unmerged.merged_at = None;
        unmerged.head_ref = "revert-12-foo".to_string();
        assert!(!is_revert(&unmerged));
    }

    #[test]
    fn test_revert_by_body_reference() {
        let mut by_body = pr("services", "Undo login change");
        by_body.body = Some("Reverts acme/services#2991\n\nBroke staging.".to_string());
        assert!(is_revert(&by_body));

        by_body.body = Some("Reverts other-org/services#2991".to_string());
        assert!(!is_revert(&by_body));

        by_body.body = Some("See acme/services#2991".to_string());
        assert!(!is_revert(&by_body));
    }

    #[test]
    fn test_revert_by_branch_name() {
        let mut by_branch = pr("services", "Undo login change");
        by_branch.head_ref = "revert-2991-feature/login".to_string();
        assert!(is_revert(&by_branch));

        by_branch.head_ref = "revert-later".to_string();
        assert!(!is_revert(&by_branch));
    }

    #[test]
    fn test_engine_pr_matches_repository_in_url() {
        let engine = RepoId::new("acme", "Engine");
        assert!(is_engine_pr(&pr("Engine", "x"), Some(&engine)));
        assert!(!is_engine_pr(&pr("EngineTools", "x"), Some(&engine)));
        assert!(!is_engine_pr(&pr("Engine", "x"), None));
    }

    #[test]
    fn test_path_flags() {
        let files = vec![
            file("services/api/handler.ts"),
            file("packages/ui/index.ts"),
        ];
        assert!(is_services_pr(&files));
        assert!(!is_library_pr(&files));
        assert!(is_package_pr(&files));
        assert!(!is_services_pr(&[file("docs/services/readme.md")]));
    }

    #[test]
    fn test_engine_pr_excludes_path_flags() {
        let engine = RepoId::new("acme", "Engine");
        let files = vec![
            file("services/a.ts"),
            file("libraries/b.ts"),
            file("packages/c.ts"),
        ];

        let flags = ModuleFlags::classify(&pr("Engine", "x"), &files, Some(&engine));
        assert_eq!(
            flags,
            ModuleFlags {
                engine: true,
                services: false,
                library: false,
                package: false
            }
        );

        let flags = ModuleFlags::classify(&pr("services", "x"), &files, Some(&engine));
        assert!(!flags.engine && flags.services && flags.library && flags.package);
    }
}

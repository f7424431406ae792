use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::{IndexEntry, Issue, IssueResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// On-disk issue store under the backup directory:
///
/// ```text
/// <backup>/<owner>/<name>/issues/
///   index.json     number, title, state, updated_at for every stored issue
///   json/<n>.json  full issue with comments
///   md/<n>.md      readable rendering
/// ```
#[derive(Debug, Clone)]
pub struct IssueArchive {
    backup_dir: PathBuf,
}

impl IssueArchive {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    pub fn issues_dir(&self, owner: &str, name: &str) -> PathBuf {
        self.backup_dir.join(owner).join(name).join("issues")
    }

    /// Newest `updated_at` in the index, if any issues were stored before
    pub async fn last_sync_time(&self, owner: &str, name: &str) -> Option<DateTime<Utc>> {
        read_index(&self.issues_dir(owner, name))
            .await
            .into_iter()
            .map(|e| e.updated_at)
            .max()
    }

    /// Store `issues`, replacing earlier copies and merging the index
    pub async fn write(&self, owner: &str, name: &str, issues: &[Issue]) -> IssueResult<()> {
        let base = self.issues_dir(owner, name);
        let json_dir = base.join("json");
        let md_dir = base.join("md");
        tokio::fs::create_dir_all(&json_dir).await?;
        tokio::fs::create_dir_all(&md_dir).await?;

        let mut index: BTreeMap<u64, IndexEntry> = read_index(&base)
            .await
            .into_iter()
            .map(|e| (e.number, e))
            .collect();

        for issue in issues {
            let json = serde_json::to_string_pretty(issue)?;
            tokio::fs::write(json_dir.join(format!("{}.json", issue.number)), json).await?;
            tokio::fs::write(md_dir.join(format!("{}.md", issue.number)), render_markdown(issue))
                .await?;
            index.insert(issue.number, IndexEntry::from(issue));
        }

        let entries: Vec<_> = index.into_values().collect();
        tokio::fs::write(base.join("index.json"), serde_json::to_string_pretty(&entries)?).await?;
        Ok(())
    }
}

// a missing or unreadable index just means a full fetch
async fn read_index(base: &Path) -> Vec<IndexEntry> {
    let Ok(data) = tokio::fs::read_to_string(base.join("index.json")).await else {
        return Vec::new();
    };
    serde_json::from_str(&data).unwrap_or_default()
}

pub(crate) fn render_markdown(issue: &Issue) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# #{}: {}\n", issue.number, issue.title);
    let _ = writeln!(md, "- **State:** {}", issue.state);
    let _ = writeln!(md, "- **Author:** {}", issue.author.login);
    if !issue.labels.is_empty() {
        let _ = writeln!(md, "- **Labels:** {}", issue.labels.join(", "));
    }
    if !issue.assignees.is_empty() {
        let logins: Vec<_> = issue.assignees.iter().map(|a| a.login.as_str()).collect();
        let _ = writeln!(md, "- **Assignees:** {}", logins.join(", "));
    }
    if !issue.milestone.is_empty() {
        let _ = writeln!(md, "- **Milestone:** {}", issue.milestone);
    }
    let _ = writeln!(md, "- **Created:** {}", issue.created_at.format(TIME_FORMAT));
    let _ = writeln!(md, "- **Updated:** {}", issue.updated_at.format(TIME_FORMAT));
    if let Some(closed) = issue.closed_at {
        let _ = writeln!(md, "- **Closed:** {}", closed.format(TIME_FORMAT));
    }
    if !issue.url.is_empty() {
        let _ = writeln!(md, "- **URL:** {}", issue.url);
    }

    let _ = writeln!(md, "\n---\n\n{}", issue.body);

    if !issue.comments.is_empty() {
        md.push_str("\n---\n\n## Comments\n");
        for comment in &issue.comments {
            let _ = writeln!(
                md,
                "\n### {} commented on {}\n\n{}",
                comment.author.login,
                comment.created_at.format(TIME_FORMAT),
                comment.body
            );
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{at, issue};
    use super::super::{IssueComment, IssueUser};
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_archive_has_no_sync_time() {
        let dir = TempDir::new().unwrap();
        let archive = IssueArchive::new(dir.path());
        assert_eq!(archive.last_sync_time("acme", "api").await, None);
    }

    #[tokio::test]
    async fn test_write_creates_files_and_index() {
        let dir = TempDir::new().unwrap();
        let archive = IssueArchive::new(dir.path());

        archive.write("acme", "api", &[issue(3, 4), issue(1, 9)]).await.unwrap();

        let base = dir.path().join("acme/api/issues");
        assert!(base.join("json/1.json").is_file());
        assert!(base.join("json/3.json").is_file());
        assert!(base.join("md/3.md").is_file());
        assert_eq!(archive.last_sync_time("acme", "api").await, Some(at(9)));

        let stored: Issue =
            serde_json::from_str(&std::fs::read_to_string(base.join("json/3.json")).unwrap()).unwrap();
        assert_eq!(stored, issue(3, 4));
    }

    #[tokio::test]
    async fn test_index_merges_and_sorts() {
        let dir = TempDir::new().unwrap();
        let archive = IssueArchive::new(dir.path());

        archive.write("acme", "api", &[issue(5, 2), issue(2, 3)]).await.unwrap();
        let mut updated = issue(5, 10);
        updated.state = "closed".to_string();
        archive.write("acme", "api", &[updated, issue(4, 6)]).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("acme/api/issues/index.json")).unwrap();
        let index: Vec<IndexEntry> = serde_json::from_str(&raw).unwrap();
        let numbers: Vec<_> = index.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![2, 4, 5]);
        assert_eq!(index[2].state, "closed");
        assert_eq!(index[2].updated_at, at(10));
    }

    #[tokio::test]
    async fn test_corrupt_index_is_ignored() {
        let dir = TempDir::new().unwrap();
        let archive = IssueArchive::new(dir.path());
        let base = archive.issues_dir("acme", "api");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("index.json"), "not json").unwrap();

        assert_eq!(archive.last_sync_time("acme", "api").await, None);
        archive.write("acme", "api", &[issue(1, 1)]).await.unwrap();
        assert_eq!(archive.last_sync_time("acme", "api").await, Some(at(1)));
    }

    #[test]
    fn test_markdown_rendering() {
        let mut i = issue(7, 2);
        i.assignees = vec![IssueUser {
            login: "bob".to_string(),
            url: String::new(),
        }];
        i.milestone = "v1".to_string();
        i.closed_at = Some(at(3));
        i.comments = vec![IssueComment {
            id: 1,
            body: "Fixed in main".to_string(),
            author: IssueUser {
                login: "carol".to_string(),
                url: String::new(),
            },
            url: String::new(),
            created_at: at(3),
            updated_at: at(3),
        }];

        let md = render_markdown(&i);
        assert!(md.starts_with("# #7: Issue 7\n\n- **State:** open\n"));
        assert!(md.contains("- **Labels:** bug\n"));
        assert!(md.contains("- **Assignees:** bob\n"));
        assert!(md.contains("- **Milestone:** v1\n"));
        assert!(md.contains("- **Created:** 2024-03-01 12:00:00 UTC\n"));
        assert!(md.contains("- **Closed:** 2024-03-03 12:00:00 UTC\n"));
        assert!(md.contains("\n---\n\nSomething broke\n"));
        assert!(md.contains("### carol commented on 2024-03-03 12:00:00 UTC\n\nFixed in main\n"));
    }
}

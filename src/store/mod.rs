//! Append-only CSV record channels and roster loading.
//!
//! Every discovery and every outreach outcome is checkpointed the moment it
//! happens: one `append` is one flushed row. A channel's header is written
//! at most once per file, decided by file existence at open time, and never
//! rewritten; re-running against the same file just keeps appending.

pub mod csv;

use crate::error::StoreError;
use crate::extract::Entity;
use chrono::Utc;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A fixed output channel: name plus explicit ordered field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

/// The record channels this crate writes.
pub mod channels {
    use super::ChannelSpec;

    /// Keyword search hits for pages, before detail enrichment.
    pub const PAGE_CANDIDATES: ChannelSpec = ChannelSpec {
        name: "page_candidates",
        fields: &["name", "url", "keyword"],
    };

    /// Keyword search hits for groups, before detail enrichment.
    pub const GROUP_CANDIDATES: ChannelSpec = ChannelSpec {
        name: "group_candidates",
        fields: &["name", "url", "keyword"],
    };

    /// Qualified pages with detail fields filled in.
    pub const PAGES: ChannelSpec = ChannelSpec {
        name: "pages",
        fields: &["name", "url", "likes", "followers", "about"],
    };

    /// Groups with detail fields filled in.
    pub const GROUPS: ChannelSpec = ChannelSpec {
        name: "groups",
        fields: &["name", "url", "keyword", "members", "description"],
    };

    /// Profiles collected from a page's follower list.
    pub const FOLLOWERS: ChannelSpec = ChannelSpec {
        name: "followers",
        fields: &["name", "profile_url", "source_context", "source_url"],
    };

    /// Profiles collected from a group's member list. Carries group
    /// passthrough columns for the outreach report.
    pub const MEMBERS: ChannelSpec = ChannelSpec {
        name: "members",
        fields: &["name", "profile_url", "source_context", "group_name", "group_url"],
    };

    /// Instagram accounts whose name or bio matched the keywords.
    pub const IG_ACCOUNTS: ChannelSpec = ChannelSpec {
        name: "instagram_accounts",
        fields: &["name", "profile_url", "followers", "bio"],
    };

    /// Profiles collected from an Instagram account's follower dialog.
    pub const IG_FOLLOWERS: ChannelSpec = ChannelSpec {
        name: "instagram_followers",
        fields: &["name", "profile_url", "source_context"],
    };

    /// One outcome row per entity processed by an outreach run.
    pub const OUTREACH_REPORT: ChannelSpec = ChannelSpec {
        name: "outreach_report",
        fields: &[
            "name",
            "profile_url",
            "group_name",
            "group_url",
            "status",
            "timestamp",
            "error",
        ],
    };
}

/// Project an entity onto a channel's field list.
///
/// `name`, `url`/`profile_url`, and `source_context` come from the entity
/// itself; every other field is an attribute lookup, missing rendered empty.
pub fn entity_row(entity: &Entity, fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .map(|field| match *field {
            "name" => entity.display_name.clone(),
            "url" | "profile_url" => entity.canonical_url.clone(),
            "source_context" => entity.source_context.clone(),
            other => entity.attr(other).to_string(),
        })
        .collect()
}

/// Append-only, resumable CSV record sink.
///
/// Not safe for concurrent writers; callers serialize access per channel.
pub struct EntityStore {
    dir: PathBuf,
    run_tag: String,
    open: HashMap<&'static str, File>,
}

impl EntityStore {
    /// Open a store rooted at `dir`, stamping this run's files with a
    /// timestamp tag.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_run_tag(dir, Utc::now().format("%Y%m%d_%H%M%S").to_string())
    }

    /// Open with a fixed tag, for resuming a previous run's files or testing.
    pub fn with_run_tag(dir: impl Into<PathBuf>, run_tag: String) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Open {
            channel: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            run_tag,
            open: HashMap::new(),
        })
    }

    /// The file backing a channel in this run.
    pub fn path_for(&self, channel: &ChannelSpec) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", channel.name, self.run_tag))
    }

    /// Append one row. Short rows are padded with empty fields; long rows
    /// are truncated to the channel's field list.
    pub fn append(&mut self, channel: &ChannelSpec, row: &[String]) -> Result<(), StoreError> {
        let path = self.path_for(channel);
        let file = match self.open.entry(channel.name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let write_header = !path.exists();
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|source| StoreError::Open {
                        channel: channel.name.to_string(),
                        source,
                    })?;
                if write_header {
                    writeln!(file, "{}", csv::format_row(channel.fields)).map_err(|source| {
                        StoreError::Append {
                            channel: channel.name.to_string(),
                            source,
                        }
                    })?;
                }
                slot.insert(file)
            }
        };

        let mut padded: Vec<&str> = row.iter().map(String::as_str).collect();
        padded.resize(channel.fields.len(), "");

        writeln!(file, "{}", csv::format_row(&padded))
            .and_then(|()| file.flush())
            .map_err(|source| StoreError::Append {
                channel: channel.name.to_string(),
                source,
            })
    }

    /// Checkpoint one entity into a channel.
    pub fn append_entity(
        &mut self,
        channel: &ChannelSpec,
        entity: &Entity,
    ) -> Result<(), StoreError> {
        self.append(channel, &entity_row(entity, channel.fields))
    }
}

/// One outreach prospect loaded from a roster file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prospect {
    pub name: String,
    pub profile_url: String,
    pub group_name: String,
    pub group_url: String,
}

/// Load an outreach roster: requires `name` and `profile_url` columns,
/// passes `group_name`/`group_url` through when present.
pub fn load_roster(path: &Path) -> Result<Vec<Prospect>, StoreError> {
    let rows = read_rows(path)?;
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let name_col = require_column(path, header, "name")?;
    let url_col = require_column(path, header, "profile_url")?;
    let group_name_col = find_column(header, "group_name");
    let group_url_col = find_column(header, "group_url");

    let mut prospects = Vec::new();
    for row in body {
        let name = cell(row, name_col);
        let profile_url = cell(row, url_col);
        if name.is_empty() || profile_url.is_empty() {
            continue;
        }
        prospects.push(Prospect {
            name,
            profile_url,
            group_name: group_name_col.map(|c| cell(row, c)).unwrap_or_default(),
            group_url: group_url_col.map(|c| cell(row, c)).unwrap_or_default(),
        });
    }
    tracing::info!(count = prospects.len(), path = %path.display(), "roster loaded");
    Ok(prospects)
}

/// Load collection sources (pages or groups): requires `name` and `url`.
pub fn load_sources(path: &Path) -> Result<Vec<(String, String)>, StoreError> {
    let rows = read_rows(path)?;
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let name_col = require_column(path, header, "name")?;
    let url_col = require_column(path, header, "url")?;

    Ok(body
        .iter()
        .filter_map(|row| {
            let name = cell(row, name_col);
            let url = cell(row, url_col);
            (!name.is_empty() && !url.is_empty()).then_some((name, url))
        })
        .collect())
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Roster {
        path: path.display().to_string(),
        source,
    })?;
    Ok(csv::parse(&content))
}

fn find_column(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim() == name)
}

fn require_column(path: &Path, header: &[String], name: &str) -> Result<usize, StoreError> {
    find_column(header, name).ok_or_else(|| StoreError::MissingColumn {
        path: path.display().to_string(),
        column: name.to_string(),
    })
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).map(|s| s.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entity(name: &str, url: &str) -> Entity {
        let mut attributes = BTreeMap::new();
        attributes.insert("keyword".to_string(), "physio".to_string());
        Entity {
            display_name: name.to_string(),
            canonical_url: url.to_string(),
            source_context: "search".to_string(),
            attributes,
        }
    }

    #[test]
    fn header_written_once_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        let spec = channels::GROUP_CANDIDATES;

        let mut store =
            EntityStore::with_run_tag(dir.path(), "t".to_string()).unwrap();
        store.append_entity(&spec, &entity("A", "https://s/groups/1")).unwrap();
        store.append_entity(&spec, &entity("B", "https://s/groups/2")).unwrap();
        drop(store);

        // A second store over the same file must not repeat the header.
        let mut resumed =
            EntityStore::with_run_tag(dir.path(), "t".to_string()).unwrap();
        resumed.append_entity(&spec, &entity("C", "https://s/groups/3")).unwrap();

        let content = std::fs::read_to_string(resumed.path_for(&spec)).unwrap();
        let rows = csv::parse(&content);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec!["name", "url", "keyword"]);
        assert_eq!(rows[3], vec!["C", "https://s/groups/3", "physio"]);
    }

    #[test]
    fn missing_fields_render_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store =
            EntityStore::with_run_tag(dir.path(), "t".to_string()).unwrap();
        // PAGES wants likes/followers/about; this entity has none of them.
        store.append_entity(&channels::PAGES, &entity("A", "https://s/p/1")).unwrap();

        let content = std::fs::read_to_string(store.path_for(&channels::PAGES)).unwrap();
        let rows = csv::parse(&content);
        assert_eq!(rows[1], vec!["A", "https://s/p/1", "", "", ""]);
    }

    #[test]
    fn roster_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members_t.csv");
        std::fs::write(
            &path,
            "name,profile_url,source_context,group_name,group_url\n\
             Asha,https://s/user/1,Physio Hub,Physio Hub,https://s/groups/7\n\
             ,https://s/user/2,Physio Hub,,\n",
        )
        .unwrap();

        let roster = load_roster(&path).unwrap();
        assert_eq!(roster.len(), 1); // blank-name row dropped
        assert_eq!(roster[0].name, "Asha");
        assert_eq!(roster[0].group_url, "https://s/groups/7");
    }

    #[test]
    fn roster_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "name,link\nAsha,https://s/1\n").unwrap();
        let err = load_roster(&path).unwrap_err();
        assert!(err.to_string().contains("profile_url"));
    }

    #[test]
    fn sources_load_name_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages_t.csv");
        std::fs::write(&path, "name,url,likes\nClinic,https://s/p/1,40\n").unwrap();
        assert_eq!(
            load_sources(&path).unwrap(),
            vec![("Clinic".to_string(), "https://s/p/1".to_string())]
        );
    }
}

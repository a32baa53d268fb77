//! Artifacts written after each stage.
//!
//! * the portable JSON document read by the dashboard and analytics scripts;
//!   its field names are fixed;
//! * a SQLite snapshot that reloads the full graph, betweenness included,
//!   without re-crawling.
//!
//! Both writers go through a temporary file in the destination directory and
//! rename it into place, so a crash never leaves a truncated artifact behind.

use crate::error::PersistenceError;
use crate::graph::{GraphStore, NodeMetrics, NodeRecord};
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SNAPSHOT_FORMAT_VERSION: i64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDocument {
    pub nodes: Vec<NodeDocument>,
    pub edges: Vec<EdgeDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDocument {
    pub id: String,
    pub depth: u32,
    pub summary: String,
    pub short_summary: String,
    pub url: String,
    pub content_preview: String,
    pub categories: Vec<String>,
    pub sections: Vec<String>,
    pub images: Vec<String>,
    pub references: Vec<String>,
    pub content_length: usize,
    pub word_count: usize,
    pub degree_centrality: f64,
    pub in_degree: usize,
    pub out_degree: usize,
    pub pagerank: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDocument {
    pub source: String,
    pub target: String,
}

impl NodeDocument {
    fn from_record(id: &str, record: &NodeRecord) -> Self {
        Self {
            id: id.to_string(),
            depth: record.depth,
            summary: record.summary.clone(),
            short_summary: record.short_summary.clone(),
            url: record.url.clone(),
            content_preview: record.content_preview.clone(),
            categories: record.categories.clone(),
            sections: record.sections.clone(),
            images: record.images.clone(),
            references: record.references.clone(),
            content_length: record.content_length,
            word_count: record.word_count,
            degree_centrality: record.metrics.degree_centrality,
            in_degree: record.metrics.in_degree,
            out_degree: record.metrics.out_degree,
            pagerank: record.metrics.pagerank,
        }
    }

    fn into_record(self) -> (String, NodeRecord) {
        let record = NodeRecord {
            depth: self.depth,
            summary: self.summary,
            short_summary: self.short_summary,
            url: self.url,
            content_preview: self.content_preview,
            categories: self.categories,
            sections: self.sections,
            images: self.images,
            references: self.references,
            content_length: self.content_length,
            word_count: self.word_count,
            metrics: NodeMetrics {
                degree_centrality: self.degree_centrality,
                in_degree: self.in_degree,
                out_degree: self.out_degree,
                betweenness: 0.0,
                pagerank: self.pagerank,
            },
        };
        (self.id, record)
    }
}

impl GraphDocument {
    pub fn from_graph(graph: &GraphStore) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|(id, record)| NodeDocument::from_record(id, record))
                .collect(),
            edges: graph
                .edges()
                .map(|(source, target)| EdgeDocument {
                    source: source.to_string(),
                    target: target.to_string(),
                })
                .collect(),
        }
    }

    /// Rebuilds a graph. Edges naming an unknown node are dropped with a
    /// warning; the store never creates placeholder nodes.
    pub fn into_graph(self) -> GraphStore {
        let mut graph = GraphStore::new();
        for node in self.nodes {
            let (id, record) = node.into_record();
            graph.insert_node(&id, record);
        }
        let mut dropped = 0;
        for edge in self.edges {
            if !(graph.contains(&edge.source) && graph.contains(&edge.target)) {
                dropped += 1;
                continue;
            }
            graph.add_edge(&edge.source, &edge.target);
        }
        if dropped > 0 {
            warn!("Dropped {} edges referencing unknown nodes", dropped);
        }
        graph
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Temporary file next to `path`, so the final rename stays on one filesystem.
fn staging_file(path: &Path) -> Result<NamedTempFile, PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    NamedTempFile::new_in(&dir).map_err(io_error(&dir))
}

pub fn write_json(graph: &GraphStore, path: &Path) -> Result<(), PersistenceError> {
    let document = GraphDocument::from_graph(graph);
    let mut staged = staging_file(path)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush().map_err(io_error(path))?;
    }
    staged.persist(path)?;

    info!(
        "Saved JSON: {} ({} nodes, {} edges)",
        path.display(),
        document.nodes.len(),
        document.edges.len()
    );
    Ok(())
}

pub fn read_json(path: &Path) -> Result<GraphStore, PersistenceError> {
    let file = File::open(path).map_err(io_error(path))?;
    let document: GraphDocument = serde_json::from_reader(BufReader::new(file))?;
    debug!(
        "Loaded JSON document {} with {} nodes",
        path.display(),
        document.nodes.len()
    );
    Ok(document.into_graph())
}

/// Identity of one snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    pub run_id: String,
    pub created_at: String,
    pub format_version: i64,
}

fn init_snapshot_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE snapshot_meta (
            run_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            format_version INTEGER NOT NULL
        );

        CREATE TABLE nodes (
            position INTEGER PRIMARY KEY,
            id TEXT UNIQUE NOT NULL,
            depth INTEGER NOT NULL,
            summary TEXT NOT NULL,
            short_summary TEXT NOT NULL,
            url TEXT NOT NULL,
            content_preview TEXT NOT NULL,
            categories TEXT NOT NULL,   -- JSON array
            sections TEXT NOT NULL,     -- JSON array
            images TEXT NOT NULL,       -- JSON array
            refs TEXT NOT NULL,         -- JSON array
            content_length INTEGER NOT NULL,
            word_count INTEGER NOT NULL,
            degree_centrality REAL NOT NULL,
            in_degree INTEGER NOT NULL,
            out_degree INTEGER NOT NULL,
            betweenness REAL NOT NULL,
            pagerank REAL NOT NULL
        );

        CREATE TABLE edges (
            position INTEGER PRIMARY KEY,
            source TEXT NOT NULL,
            target TEXT NOT NULL
        );
        ",
    )
}

pub fn write_snapshot(graph: &GraphStore, path: &Path) -> Result<SnapshotMeta, PersistenceError> {
    let meta = SnapshotMeta {
        run_id: Uuid::new_v4().to_string(),
        created_at: Utc::now().to_rfc3339(),
        format_version: SNAPSHOT_FORMAT_VERSION,
    };

    let staged = staging_file(path)?;
    {
        let mut conn = Connection::open(staged.path())?;
        init_snapshot_schema(&conn)?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshot_meta (run_id, created_at, format_version) VALUES (?1, ?2, ?3)",
            params![&meta.run_id, &meta.created_at, meta.format_version],
        )?;
        {
            let mut insert_node = tx.prepare(
                "INSERT INTO nodes (
                    position, id, depth, summary, short_summary, url, content_preview,
                    categories, sections, images, refs, content_length, word_count,
                    degree_centrality, in_degree, out_degree, betweenness, pagerank
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )?;
            for (position, (id, record)) in graph.nodes().enumerate() {
                insert_node.execute(params![
                    position as i64,
                    id,
                    record.depth as i64,
                    &record.summary,
                    &record.short_summary,
                    &record.url,
                    &record.content_preview,
                    serde_json::to_string(&record.categories)?,
                    serde_json::to_string(&record.sections)?,
                    serde_json::to_string(&record.images)?,
                    serde_json::to_string(&record.references)?,
                    record.content_length as i64,
                    record.word_count as i64,
                    record.metrics.degree_centrality,
                    record.metrics.in_degree as i64,
                    record.metrics.out_degree as i64,
                    record.metrics.betweenness,
                    record.metrics.pagerank,
                ])?;
            }

            let mut insert_edge =
                tx.prepare("INSERT INTO edges (position, source, target) VALUES (?1, ?2, ?3)")?;
            for (position, (source, target)) in graph.edges().enumerate() {
                insert_edge.execute(params![position as i64, source, target])?;
            }
        }
        tx.commit()?;
    }
    staged.persist(path)?;

    info!(
        "Saved snapshot: {} ({} nodes, {} edges, run {})",
        path.display(),
        graph.node_count(),
        graph.edge_count(),
        meta.run_id
    );
    Ok(meta)
}

fn decode_list(text: &str) -> Result<Vec<String>, PersistenceError> {
    Ok(serde_json::from_str(text)?)
}

pub fn read_snapshot(path: &Path) -> Result<(GraphStore, SnapshotMeta), PersistenceError> {
    if !path.exists() {
        return Err(PersistenceError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot not found"),
        });
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let meta = conn
        .query_row(
            "SELECT run_id, created_at, format_version FROM snapshot_meta LIMIT 1",
            [],
            |row| {
                Ok(SnapshotMeta {
                    run_id: row.get(0)?,
                    created_at: row.get(1)?,
                    format_version: row.get(2)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                PersistenceError::Malformed("missing snapshot_meta row".into())
            }
            other => PersistenceError::Sqlite(other),
        })?;
    if meta.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(PersistenceError::Malformed(format!(
            "unsupported format version {}",
            meta.format_version
        )));
    }

    let mut graph = GraphStore::new();

    let mut stmt = conn.prepare(
        "SELECT id, depth, summary, short_summary, url, content_preview,
                categories, sections, images, refs, content_length, word_count,
                degree_centrality, in_degree, out_degree, betweenness, pagerank
         FROM nodes ORDER BY position",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let depth: i64 = row.get(1)?;
        let categories: String = row.get(6)?;
        let sections: String = row.get(7)?;
        let images: String = row.get(8)?;
        let references: String = row.get(9)?;
        let content_length: i64 = row.get(10)?;
        let word_count: i64 = row.get(11)?;
        let in_degree: i64 = row.get(13)?;
        let out_degree: i64 = row.get(14)?;

        let record = NodeRecord {
            depth: depth as u32,
            summary: row.get(2)?,
            short_summary: row.get(3)?,
            url: row.get(4)?,
            content_preview: row.get(5)?,
            categories: decode_list(&categories)?,
            sections: decode_list(&sections)?,
            images: decode_list(&images)?,
            references: decode_list(&references)?,
            content_length: content_length as usize,
            word_count: word_count as usize,
            metrics: NodeMetrics {
                degree_centrality: row.get(12)?,
                in_degree: in_degree as usize,
                out_degree: out_degree as usize,
                betweenness: row.get(15)?,
                pagerank: row.get(16)?,
            },
        };
        graph.insert_node(&id, record);
    }

    let mut stmt = conn.prepare("SELECT source, target FROM edges ORDER BY position")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let source: String = row.get(0)?;
        let target: String = row.get(1)?;
        if !graph.add_edge(&source, &target) && !graph.contains_edge(&source, &target) {
            return Err(PersistenceError::Malformed(format!(
                "edge {} -> {} references an unknown node",
                source, target
            )));
        }
    }

    debug!(
        "Loaded snapshot {} (run {}, {} nodes, {} edges)",
        path.display(),
        meta.run_id,
        graph.node_count(),
        graph.edge_count()
    );
    Ok((graph, meta))
}

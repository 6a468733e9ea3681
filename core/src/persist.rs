use crate::config::EngineConfig;
use crate::graph::ReferenceGraph;
use crate::index::SubstringIndex;
use crate::search::{Corpus, SearchEngine};
use crate::{Error, Page, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Bumped whenever the encoded layout changes.
pub const FORMAT_VERSION: u32 = 1;
const MAGIC: &[u8; 5] = b"FOLIO";
const HEADER_LEN: usize = MAGIC.len() + 4;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_pages: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn state(&self) -> PathBuf { self.root.join("state.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    config: &'a EngineConfig,
    pages: &'a [Page],
    index: &'a SubstringIndex,
    graph: &'a ReferenceGraph,
}

#[derive(Deserialize)]
struct Snapshot {
    config: EngineConfig,
    pages: Vec<Page>,
    index: SubstringIndex,
    graph: ReferenceGraph,
}

/// Encode a built engine (pages, index, graph with scores, config) into one blob.
pub fn encode(engine: &SearchEngine) -> Result<Vec<u8>> {
    let corpus = engine.corpus()?;
    let body = bincode::serialize(&SnapshotRef {
        config: engine.config(),
        pages: &corpus.pages,
        index: &corpus.index,
        graph: &corpus.graph,
    })?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<SearchEngine> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::Corrupt("missing header"));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let found = u32::from_le_bytes(version);
    if found != FORMAT_VERSION {
        return Err(Error::IncompatibleFormat { found, expected: FORMAT_VERSION });
    }
    let Snapshot { config, pages, mut index, graph } = bincode::deserialize(&bytes[HEADER_LEN..])?;
    if pages.iter().enumerate().any(|(pos, page)| page.id as usize != pos) {
        return Err(Error::Corrupt("page ids out of order"));
    }
    index.validate(pages.len()).map_err(Error::Corrupt)?;
    Ok(SearchEngine::from_parts(config, Corpus { pages, index, graph }))
}

pub fn save_engine(paths: &IndexPaths, engine: &SearchEngine) -> Result<()> {
    let bytes = encode(engine)?;
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.state())?;
    f.write_all(&bytes)?;
    tracing::info!(path = %paths.state().display(), bytes = bytes.len(), "index saved");
    Ok(())
}

pub fn load_engine(paths: &IndexPaths) -> Result<SearchEngine> {
    let mut f = File::open(paths.state())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let engine = decode(&buf)?;
    tracing::info!(path = %paths.state().display(), "index loaded");
    Ok(engine)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

impl SearchEngine {
    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        save_engine(paths, self)
    }

    pub fn load(paths: &IndexPaths) -> Result<Self> {
        load_engine(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_requires_a_build() {
        assert!(matches!(encode(&SearchEngine::default()), Err(Error::NotReady)));
    }

    #[test]
    fn rejects_foreign_and_future_blobs() {
        assert!(matches!(decode(b"nope"), Err(Error::Corrupt(_))));
        let mut engine = SearchEngine::default();
        engine.build_index(vec!["alpha"]);
        let mut bytes = encode(&engine).unwrap();
        bytes[MAGIC.len()] = 9;
        assert!(matches!(decode(&bytes), Err(Error::IncompatibleFormat { found: 9, expected: 1 })));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut engine = SearchEngine::default();
        engine.build_index(vec!["alpha beta", "gamma"]);
        let bytes = encode(&engine).unwrap();
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(err.is_persist());
    }

    fn blob(pages: &[Page], index: &SubstringIndex) -> Vec<u8> {
        let graph = ReferenceGraph::from_pages(pages);
        let body = bincode::serialize(&SnapshotRef {
            config: &EngineConfig::default(),
            pages,
            index,
            graph: &graph,
        })
        .unwrap();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }

    #[test]
    fn dangling_page_ids_are_corrupt() {
        let pages = vec![Page { id: 0, text: "alpha".into() }];
        let mut index = SubstringIndex::new();
        index.insert("alpha", 0);
        assert!(decode(&blob(&pages, &index)).is_ok());

        let mut beyond = SubstringIndex::new();
        beyond.insert("alpha", 4);
        assert!(matches!(decode(&blob(&pages, &beyond)), Err(Error::Corrupt(_))));

        let shifted = vec![Page { id: 1, text: "alpha".into() }];
        assert!(matches!(decode(&blob(&shifted, &index)), Err(Error::Corrupt(_))));
    }

    #[test]
    fn damaged_bytes_fail_to_load_or_stay_queryable() {
        let mut engine = SearchEngine::default();
        engine.build_index(vec!["alpha beta", "see page 1 for alpha"]);
        let bytes = encode(&engine).unwrap();
        let mut rejected = 0;
        for pos in HEADER_LEN..bytes.len() {
            for mask in [0x01u8, 0x80, 0xff] {
                let mut damaged = bytes.clone();
                damaged[pos] ^= mask;
                let loaded = match decode(&damaged) {
                    Ok(engine) => engine,
                    Err(err) => {
                        assert!(err.is_persist());
                        rejected += 1;
                        continue;
                    }
                };
                for q in ["alp", "beta AND alpha", "NOT beta", "alpha*", "\"page 1\""] {
                    let _ = loaded.search(q, 1, 10);
                }
                let _ = loaded.page(2);
                let _ = loaded.index().map(|index| index.vocabulary().count());
            }
        }
        assert!(rejected > 0);
    }
}

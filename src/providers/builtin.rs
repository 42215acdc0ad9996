// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Built-in provider.
//!
//! Chat answers with an acknowledgement of the last user message. Search
//! ranks the text documents in the router's project directory by the share
//! of query terms they contain.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::types::{ChatMessage, ChatRequest, ChatResponse, SearchHit, SearchRequest, SearchResponse};
use super::ProviderError;
use crate::models::Router;

const MODEL_NAME: &str = "builtin-echo";
const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md"];
const MAX_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct BuiltinProvider {
    projects_root: PathBuf,
}

impl BuiltinProvider {
    pub fn new(projects_root: impl AsRef<Path>) -> Self {
        Self {
            projects_root: projects_root.as_ref().to_path_buf(),
        }
    }

    pub fn chat(&self, router: &Router, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let content = match request.last_user_message() {
            Some(message) if !message.trim().is_empty() => {
                format!("[{}] {}", router.name, message.trim())
            }
            _ => String::new(),
        };

        Ok(ChatResponse {
            id: Uuid::new_v4().to_string(),
            model: request.model.clone().unwrap_or_else(|| MODEL_NAME.to_string()),
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
            },
        })
    }

    pub fn search(&self, router: &Router, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        let terms: Vec<String> = request
            .query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let root = self.projects_root.join(&router.name);
        let mut documents = Vec::new();
        collect_documents(&root, &mut documents)
            .map_err(|e| ProviderError::Upstream(format!("reading project documents: {e}")))?;

        let mut results: Vec<SearchHit> = documents
            .into_iter()
            .filter_map(|path| {
                let text = fs::read_to_string(&path).ok()?;
                let lower = text.to_lowercase();
                let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                if matched == 0 {
                    return None;
                }
                let id = path
                    .strip_prefix(&root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                Some(SearchHit {
                    id,
                    content: text.chars().take(MAX_SNIPPET_CHARS).collect(),
                    score: matched as f64 / terms.len() as f64,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(request.effective_limit());

        Ok(SearchResponse {
            id: Uuid::new_v4().to_string(),
            query: request.query.clone(),
            results,
        })
    }
}

/// Text documents below `dir`, recursively. A missing directory has none.
fn collect_documents(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_documents(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e))
        {
            out.push(path);
        }
    }
    Ok(())
}

//! Cached point lookups: controller files, method definitions, callbacks.

use std::path::{Component, Path};

use regex::Regex;

use super::{CodeHit, CodeSearchEngine};
use crate::inflect::underscore;

/// Callbacks that fire after a model write
pub const WRITE_CALLBACKS: &[&str] = &["after_create", "after_save", "after_commit"];

/// `UsersController`, `admin/users`, `Admin::Users` -> `admin/users`
fn controller_path(controller: &str) -> String {
    controller
        .trim()
        .trim_end_matches(".rb")
        .split(['/', ':'])
        .filter(|part| !matches!(*part, "" | "." | ".."))
        .map(|part| {
            let snake = underscore(part.trim_end_matches("Controller"));
            snake.trim_end_matches("_controller").to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative path without `..` or a root
fn is_contained(file: &str) -> bool {
    Path::new(file)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl CodeSearchEngine {
    async fn read_relative(&self, file: &str) -> Option<String> {
        if !is_contained(file) {
            tracing::debug!(file, "path leaves the project root");
            return None;
        }
        match tokio::fs::read_to_string(self.root.join(file)).await {
            Ok(content) => Some(content),
            Err(err) => {
                tracing::debug!(file, error = %err, "cannot read file");
                None
            }
        }
    }

    /// `app/controllers/{name}_controller.rb` when it exists
    pub async fn find_controller_file(&mut self, controller: &str) -> Option<String> {
        if let Some(cached) = self.controller_cache.get(controller) {
            return cached.clone();
        }
        let path = controller_path(controller);
        if path.is_empty() {
            return None;
        }
        let candidate = format!("app/controllers/{}_controller.rb", path);
        let found = tokio::fs::metadata(self.root.join(&candidate))
            .await
            .is_ok_and(|m| m.is_file())
            .then_some(candidate);
        self.controller_cache
            .insert(controller.to_string(), found.clone());
        found
    }

    /// Conventional model file for a class name, when it exists
    pub async fn find_model_file(&self, model: &str) -> Option<String> {
        let candidate = format!("app/models/{}.rb", underscore(model));
        tokio::fs::metadata(self.root.join(&candidate))
            .await
            .is_ok_and(|m| m.is_file())
            .then_some(candidate)
    }

    /// 1-based line of `def method` (or `def self.method`) in `file`
    pub async fn find_method_definition(&mut self, file: &str, method: &str) -> Option<usize> {
        let key = (file.to_string(), method.to_string());
        if let Some(cached) = self.method_cache.get(&key) {
            return *cached;
        }
        let re = Regex::new(&format!(r"^\s*def\s+(self\.)?{}\b", regex::escape(method))).ok()?;
        let found = self
            .read_relative(file)
            .await
            .and_then(|content| first_matching_line(&content, &re));
        self.method_cache.insert(key, found);
        found
    }

    /// 1-based line declaring `callback_type :method` in `file`
    pub async fn find_callback_declaration(
        &mut self,
        file: &str,
        callback_type: &str,
        method: &str
    ) -> Option<usize> {
        let key = (file.to_string(), callback_type.to_string(), method.to_string());
        if let Some(cached) = self.callback_cache.get(&key) {
            return *cached;
        }
        let re = Regex::new(&format!(
            r"\b{}\s+:{}\b",
            regex::escape(callback_type),
            regex::escape(method)
        ))
        .ok()?;
        let found = self
            .read_relative(file)
            .await
            .and_then(|content| first_matching_line(&content, &re));
        self.callback_cache.insert(key, found);
        found
    }

    /// Every declaration of the given callback types in `file`
    pub async fn find_callbacks(&self, file: &str, callback_types: &[&str]) -> Vec<CodeHit> {
        let alternatives = callback_types
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let Ok(re) = Regex::new(&format!(r"^\s*({})\b", alternatives)) else {
            return Vec::new();
        };
        let Some(content) = self.read_relative(file).await else {
            return Vec::new();
        };
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| re.is_match(line))
            .map(|(idx, line)| CodeHit {
                file:    file.to_string(),
                line:    idx + 1,
                content: line.trim().to_string()
            })
            .collect()
    }

    /// `context` lines of `file` starting at 1-based `line`
    pub async fn read_context(&self, file: &str, line: usize, context: usize) -> Option<String> {
        let content = self.read_relative(file).await?;
        let lines: Vec<&str> = content
            .lines()
            .skip(line.saturating_sub(1))
            .take(context)
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

fn first_matching_line(content: &str, re: &Regex) -> Option<usize> {
    content
        .lines()
        .position(|line| re.is_match(line))
        .map(|idx| idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_path() {
        assert_eq!(controller_path("users"), "users");
        assert_eq!(controller_path("UsersController"), "users");
        assert_eq!(controller_path("admin/page_views"), "admin/page_views");
        assert_eq!(controller_path("Admin::PageViewsController"), "admin/page_views");
        assert_eq!(controller_path("users_controller"), "users");
    }

    #[test]
    fn test_controller_path_stays_under_controllers() {
        assert_eq!(controller_path("../../x"), "x");
        assert_eq!(controller_path("admin/./../users"), "admin/users");
        assert_eq!(controller_path(".."), "");
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained("app/models/member.rb"));
        assert!(is_contained("./app/models/member.rb"));
        assert!(!is_contained("../outside.rb"));
        assert!(!is_contained("/etc/passwd"));
    }
}

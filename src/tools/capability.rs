//! 能力发现与分类
//!
//! 从各 provider 拉取工具列表，按名称子串归入 data / chart / news / report。
//! 分类按类别顺序检查、先命中者胜，保证一个工具最多属于一个类别；不命中的工具不分配给任何 Worker。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::{Category, HiveError};
use crate::tools::{ToolProvider, ToolResult, ToolSpec};

/// 一个可调用的工具能力：描述 + 所属 provider 的引用
#[derive(Clone)]
pub struct ToolCapability {
    pub spec: ToolSpec,
    pub category: Option<Category>,
    provider: Arc<dyn ToolProvider>,
}

impl fmt::Debug for ToolCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCapability")
            .field("name", &self.spec.name)
            .field("category", &self.category)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl ToolCapability {
    pub fn new(spec: ToolSpec, provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            spec,
            category: None,
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn invoke(&self, args: Value) -> Result<ToolResult, HiveError> {
        self.provider.invoke(&self.spec.name, args).await
    }
}

/// 分类规则：有序的 (类别, 名称子串列表)
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<(Category, Vec<String>)>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        let rule = |c: Category, keys: &[&str]| -> (Category, Vec<String>) {
            (c, keys.iter().map(|k| k.to_string()).collect())
        };
        Self {
            rules: vec![
                rule(Category::Data, &["price", "historical_data", "info"]),
                rule(Category::Chart, &["chart", "comparison"]),
                rule(Category::News, &["news"]),
                rule(Category::Report, &["report"]),
            ],
        }
    }
}

impl CategoryRules {
    pub fn new(rules: Vec<(Category, Vec<String>)>) -> Self {
        Self { rules }
    }

    /// 第一个名称子串命中的类别
    pub fn classify(&self, tool_name: &str) -> Option<Category> {
        self.rules
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| tool_name.contains(k.as_str())))
            .map(|(c, _)| *c)
    }

    pub fn categorize(
        &self,
        capabilities: impl IntoIterator<Item = ToolCapability>,
    ) -> BTreeMap<Category, Vec<ToolCapability>> {
        let mut by_category: BTreeMap<Category, Vec<ToolCapability>> = BTreeMap::new();
        for mut cap in capabilities {
            match self.classify(cap.name()) {
                Some(category) => {
                    cap.category = Some(category);
                    by_category.entry(category).or_default().push(cap);
                }
                None => tracing::debug!(tool = %cap.name(), "capability matches no category, unused"),
            }
        }
        by_category
    }
}

/// 从所有 provider 拉取能力；单个 provider 列举失败时记 warn 并跳过
pub async fn discover(providers: &[Arc<dyn ToolProvider>]) -> Vec<ToolCapability> {
    let mut capabilities = Vec::new();
    for provider in providers {
        match provider.list_capabilities().await {
            Ok(specs) => {
                tracing::info!(
                    provider = %provider.name(),
                    tools = ?specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                    "discovered tools"
                );
                capabilities.extend(
                    specs
                        .into_iter()
                        .map(|spec| ToolCapability::new(spec, provider.clone())),
                );
            }
            Err(e) => tracing::warn!(provider = %provider.name(), "tool discovery failed: {}", e),
        }
    }
    capabilities
}

/// 分类后的只读能力表，多会话共享
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    by_category: BTreeMap<Category, Vec<ToolCapability>>,
}

impl CapabilityRegistry {
    pub fn new(
        capabilities: impl IntoIterator<Item = ToolCapability>,
        rules: &CategoryRules,
    ) -> Self {
        let by_category = rules.categorize(capabilities);
        for (category, caps) in &by_category {
            tracing::info!(
                "  - {}: {:?}",
                category,
                caps.iter().map(|c| c.name()).collect::<Vec<_>>()
            );
        }
        Self { by_category }
    }

    pub async fn discover(providers: &[Arc<dyn ToolProvider>], rules: &CategoryRules) -> Self {
        Self::new(discover(providers).await, rules)
    }

    pub fn for_category(&self, category: Category) -> &[ToolCapability] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Server-rendered page listing the current snapshot.
//!
//! Categories appear in configured order, followed by any category present in
//! the snapshot but no longer configured (e.g. loaded from an older file).
//! Titles, URLs and source names are escaped here; `summary_html` was built
//! from escaped text by the enricher and is inserted as-is.

use crate::config::CompiledCategory;
use crate::models::{AggregateSnapshot, NewsItem};
use html_escape::{encode_double_quoted_attribute, encode_text};

const PAGE_TITLE: &str = "科技资讯聚合";
const STYLE: &str = r#"
  body { margin: 0; padding: 24px; font-family: -apple-system, 'Segoe UI', 'PingFang SC', 'Microsoft YaHei', sans-serif; background: #0b0f17; color: #e6eefc; }
  header, main, footer { max-width: 1080px; margin: 0 auto; }
  .meta, footer, .news-meta { color: #8aa0c6; font-size: 13px; }
  section { background: #121826; border: 1px solid #22304a; border-radius: 14px; padding: 14px; margin-bottom: 18px; }
  .news-item { border-top: 1px dashed #22304a; padding: 12px 6px; }
  .news-item:first-of-type { border-top: none; }
  .news-title a { color: #e6eefc; text-decoration: none; }
  .news-summary iframe, .news-summary video { width: 100%; max-height: 380px; border: none; }
  .news-meta a { color: #8aa0c6; }
"#;

/// Render the whole page.
pub fn render_page(snapshot: &AggregateSnapshot, categories: &[CompiledCategory]) -> String {
    let updated = snapshot
        .timestamp
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "尚未更新".to_string());

    let mut sections = String::new();
    for category in categories {
        sections.push_str(&render_section(
            &category.label,
            &category.icon,
            snapshot.category(&category.id),
        ));
    }
    for (id, items) in &snapshot.categories {
        if !categories.iter().any(|c| &c.id == id) {
            sections.push_str(&render_section(id, "📰", items));
        }
    }

    format!(
        r#"<!doctype html>
<html lang="zh-CN">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{title}</title>
  <style>{style}</style>
</head>
<body>
  <header>
    <h1>{title}</h1>
    <div class="meta">每小时自动更新 · 上次更新：{updated} · 共 {total} 条</div>
  </header>
  <main>
{sections}  </main>
  <footer>仅供学习与参考，内容均来自各来源网站，版权归原网站所有。</footer>
</body>
</html>
"#,
        title = PAGE_TITLE,
        style = STYLE,
        updated = encode_text(&updated),
        total = snapshot.total_items,
        sections = sections,
    )
}

fn render_section(label: &str, icon: &str, items: &[NewsItem]) -> String {
    let body = if items.is_empty() {
        r#"      <p class="empty">暂无数据</p>
"#
        .to_string()
    } else {
        items.iter().map(render_item).collect::<String>()
    };
    format!(
        "    <section>\n      <h2>{} <span class=\"icon\">{}</span></h2>\n{}    </section>\n",
        encode_text(label),
        encode_text(icon),
        body
    )
}

fn render_item(item: &NewsItem) -> String {
    let href = encode_double_quoted_attribute(&item.url);
    format!(
        r#"      <article class="news-item">
        <h3 class="news-title"><a href="{href}" target="_blank" rel="noopener noreferrer">{title}</a></h3>
        <div class="news-summary">{summary}</div>
        <div class="news-meta"><span class="source">来源：{source}</span> <a class="origin" href="{href}" target="_blank" rel="noopener noreferrer">原文链接 ↗</a></div>
      </article>
"#,
        href = href,
        title = encode_text(&item.title),
        summary = item.summary_html,
        source = encode_text(&item.source),
    )
}

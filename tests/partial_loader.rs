//! 局部片段加载集成测试

mod common;

use std::sync::Arc;

use ktvdi_offline::network::{Response, ResponseType};
use ktvdi_offline::partials::{
    LoadError, PageDocument, PartialLoader, PartialSlot, FOOTER_PARTIAL, HEADER_PARTIAL,
};
use ktvdi_offline::OfflineConfig;

use common::{test_config, url, ScriptedFetcher};

const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>KTVDI</title></head>
<body><header id="header"></header><main><h1>Jadwal</h1></main><footer id="footer"></footer></body>
</html>"#;

const HEADER_HTML: &str = r#"<nav><a href="/">Beranda</a></nav>"#;
const FOOTER_HTML: &str = "<p>&copy; KTVDI</p>";

fn loader(fetcher: &Arc<ScriptedFetcher>) -> PartialLoader<Arc<ScriptedFetcher>> {
    PartialLoader::from_config(&test_config("ktvdi-v2"), Arc::clone(fetcher)).unwrap()
}

fn site_with_partials() -> Arc<ScriptedFetcher> {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(HEADER_PARTIAL, 200, HEADER_HTML);
    fetcher.respond(FOOTER_PARTIAL, 200, FOOTER_HTML);
    fetcher
}

#[tokio::test]
async fn test_both_partials_are_injected() {
    let fetcher = site_with_partials();
    let loader = loader(&fetcher);
    let page = PageDocument::parse_str(PAGE);

    let outcomes = loader.load_page_partials(&page, loader.slots()).await;

    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert!(outcomes.iter().all(|outcome| !outcome.fallback_rendered));
    assert_eq!(page.inner_html("header").unwrap(), HEADER_HTML);
    assert_eq!(page.inner_html("footer").unwrap(), "<p>© KTVDI</p>");
}

/// 页眉 404 时显示回退提示，页脚照常加载
#[tokio::test]
async fn test_failed_header_falls_back_without_blocking_footer() {
    let fetcher = site_with_partials();
    fetcher.respond(HEADER_PARTIAL, 404, "not here");
    let loader = loader(&fetcher);
    let page = PageDocument::parse_str(PAGE);

    let outcomes = loader.load_page_partials(&page, loader.slots()).await;

    let header = &outcomes[0];
    assert_eq!(header.slot_id, "header");
    assert_eq!(header.result.as_ref().unwrap_err().status(), Some(404));
    assert!(header.fallback_rendered);
    assert_eq!(
        page.inner_html("header").unwrap(),
        loader.fallback_message()
    );

    let footer = &outcomes[1];
    assert!(footer.result.is_ok());
    assert_eq!(page.inner_html("footer").unwrap(), "<p>© KTVDI</p>");
}

#[tokio::test]
async fn test_network_failures_render_fallback_in_both_slots() {
    let fetcher = ScriptedFetcher::new();
    fetcher.set_offline(true);
    let loader = loader(&fetcher);
    let page = PageDocument::parse_str(PAGE);

    let outcomes = loader.load_page_partials(&page, loader.slots()).await;

    for outcome in &outcomes {
        assert!(matches!(outcome.result, Err(LoadError::Network { .. })));
        assert!(outcome.fallback_rendered);
        assert_eq!(
            page.inner_html(&outcome.slot_id).unwrap(),
            loader.fallback_message()
        );
    }
    // 页面其余部分保持不变
    assert!(page.has_slot("header"));
    let html = String::from_utf8(page.serialize().unwrap()).unwrap();
    assert!(html.contains("<h1>Jadwal</h1>"));
}

#[tokio::test]
async fn test_missing_slot_is_reported() {
    let fetcher = site_with_partials();
    fetcher.respond("/static/partials/sidebar.html", 200, "<ul></ul>");
    let loader = loader(&fetcher);
    let page = PageDocument::parse_str(PAGE);

    let error = loader
        .load_component(&page, "sidebar", "/static/partials/sidebar.html")
        .await
        .unwrap_err();
    assert_eq!(
        error,
        LoadError::MissingSlot {
            slot_id: "sidebar".to_string()
        }
    );

    let outcomes = loader
        .load_page_partials(
            &page,
            &[PartialSlot::new("sidebar", "/static/partials/sidebar.html")],
        )
        .await;
    assert!(!outcomes[0].fallback_rendered);
}

/// 片段按响应头中的 charset 解码
#[tokio::test]
async fn test_partial_is_decoded_with_declared_charset() {
    let fetcher = ScriptedFetcher::new();
    let body = b"<p>Caf\xe9 & siaran</p>".to_vec();
    fetcher.respond_with(
        "/static/partials/latin.html",
        Response::new(
            url("/static/partials/latin.html").as_str(),
            200,
            body,
            ResponseType::Basic,
        )
        .with_header("Content-Type", "text/html; charset=windows-1252"),
    );
    let loader = loader(&fetcher);

    let text = loader
        .fetch_partial("/static/partials/latin.html")
        .await
        .unwrap();
    assert_eq!(text, "<p>Café & siaran</p>");
}

#[tokio::test]
async fn test_assemble_page_uses_configured_slots() {
    let fetcher = site_with_partials();
    fetcher.respond("/static/partials/nav.html", 200, "<a href=\"/peta\">Peta</a>");
    let config = OfflineConfig {
        partials: vec![
            PartialSlot::new("header", "/static/partials/nav.html"),
            PartialSlot::new("footer", FOOTER_PARTIAL),
        ],
        ..test_config("ktvdi-v2")
    };
    let loader = PartialLoader::from_config(&config, Arc::clone(&fetcher)).unwrap();

    let (html, outcomes) = loader.assemble_page(PAGE.as_bytes(), "utf-8").await.unwrap();
    let html = String::from_utf8(html).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains(r#"<header id="header"><a href="/peta">Peta</a></header>"#));
    assert!(html.contains(r#"<footer id="footer"><p>© KTVDI</p></footer>"#));
    assert_eq!(fetcher.request_count(HEADER_PARTIAL), 0);
}

/// 片段按插槽元素的上下文解析，表格行可以直接注入 <tbody>
#[tokio::test]
async fn test_table_rows_load_into_tbody_slot() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(
        "/static/partials/kanal.html",
        200,
        "<!-- daftar kanal -->\n<tr><td>TVRI</td></tr>",
    );
    let loader = loader(&fetcher);
    let page = PageDocument::parse_str(
        r#"<table><tbody id="kanal"><tr><td>memuat...</td></tr></tbody></table>"#,
    );

    loader
        .load_component(&page, "kanal", "/static/partials/kanal.html")
        .await
        .unwrap();

    assert_eq!(
        page.inner_html("kanal").unwrap(),
        "<!-- daftar kanal -->\n<tr><td>TVRI</td></tr>"
    );
}

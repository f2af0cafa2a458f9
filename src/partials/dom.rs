//! 页面 DOM 操作
//!
//! 解析页面、按 id 定位插槽、替换插槽内容并序列化回 HTML。

use std::io;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_document, parse_fragment, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let text = decode_text(data, Some(document_encoding));
    parse_document(RcDom::default(), Default::default()).one(text)
}

/// 按给定字符集解码文本，无法识别时按 UTF-8 处理
///
/// 存在字节顺序标记（BOM）时以 BOM 为准。
pub fn decode_text(data: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(data);
    text.into_owned()
}

/// 从 Content-Type 头中取出 charset 参数
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 按 id 查找元素（文档顺序中的第一个）
pub fn find_element_by_id(node: &Handle, id: &str) -> Option<Handle> {
    if get_node_attr(node, "id").as_deref() == Some(id) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element_by_id(child, id))
}

/// 以插槽元素为上下文解析 HTML 片段，返回可挂载的节点列表
///
/// 非元素节点按 `<body>` 上下文解析。
pub fn parse_fragment_nodes(html: &str, context: &Handle) -> Vec<Handle> {
    let (name, attrs) = match &context.data {
        NodeData::Element { name, attrs, .. } => (name.clone(), attrs.borrow().clone()),
        _ => (QualName::new(None, ns!(html), local_name!("body")), Vec::new()),
    };
    let dom = parse_fragment(RcDom::default(), Default::default(), name, attrs).one(html);

    // 片段节点挂在文档下唯一的 <html> 根元素上
    let Some(root) = dom.document.children.borrow().first().cloned() else {
        return Vec::new();
    };
    let nodes: Vec<Handle> = root.children.borrow_mut().drain(..).collect();
    nodes
}

/// 用新节点替换父节点的全部子节点
pub fn replace_children(parent: &Handle, nodes: Vec<Handle>) {
    let mut children = parent.children.borrow_mut();
    for old in children.drain(..) {
        old.parent.set(None);
    }
    for node in nodes {
        node.parent.set(Some(Rc::downgrade(parent)));
        children.push(node);
    }
}

fn serialize_handle(handle: &Handle, traversal_scope: TraversalScope) -> io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = handle.clone().into();
    serialize(
        &mut buf,
        &serializable,
        SerializeOpts {
            traversal_scope,
            ..Default::default()
        },
    )?;
    Ok(buf)
}

/// 已解析的页面
pub struct PageDocument {
    dom: RcDom,
}

impl PageDocument {
    pub fn parse(data: &[u8], document_encoding: &str) -> Self {
        Self {
            dom: html_to_dom(data, document_encoding),
        }
    }

    pub fn parse_str(html: &str) -> Self {
        Self::parse(html.as_bytes(), "utf-8")
    }

    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    pub fn find_by_id(&self, id: &str) -> Option<Handle> {
        find_element_by_id(&self.dom.document, id)
    }

    pub fn has_slot(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    /// 替换插槽内容；插槽不存在时返回 `false`
    pub fn set_inner_html(&self, id: &str, html: &str) -> bool {
        match self.find_by_id(id) {
            Some(slot) => {
                replace_children(&slot, parse_fragment_nodes(html, &slot));
                true
            }
            None => false,
        }
    }

    /// 插槽当前内容的 HTML
    pub fn inner_html(&self, id: &str) -> Option<String> {
        let slot = self.find_by_id(id)?;
        let bytes = serialize_handle(&slot, TraversalScope::ChildrenOnly(None)).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// 序列化整个文档
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        // 文档节点本身不可序列化，只能序列化其子节点
        serialize_handle(&self.dom.document, TraversalScope::ChildrenOnly(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>KTVDI</title></head>
<body><div id="header">memuat...</div><main><p>isi</p></main><div id="footer"></div></body>
</html>"#;

    #[test]
    fn finds_slots_by_id() {
        let page = PageDocument::parse_str(PAGE);
        assert!(page.has_slot("header"));
        assert!(page.has_slot("footer"));
        assert!(!page.has_slot("sidebar"));
    }

    #[test]
    fn set_inner_html_replaces_children() {
        let page = PageDocument::parse_str(PAGE);
        assert!(page.set_inner_html("header", "<nav><a href=\"/\">Beranda</a></nav>"));
        assert_eq!(
            page.inner_html("header").unwrap(),
            "<nav><a href=\"/\">Beranda</a></nav>"
        );

        let html = String::from_utf8(page.serialize().unwrap()).unwrap();
        assert!(html.contains("<div id=\"header\"><nav>"));
        assert!(!html.contains("memuat..."));
        assert!(html.contains("<p>isi</p>"));
    }

    #[test]
    fn table_rows_are_parsed_in_slot_context() {
        let page = PageDocument::parse_str(
            r#"<table><thead><tr><th>Kanal</th></tr></thead><tbody id="rows"></tbody></table>"#,
        );
        assert!(page.set_inner_html("rows", "<tr><td>TVRI</td></tr><tr><td>RCTI</td></tr>"));
        assert_eq!(
            page.inner_html("rows").unwrap(),
            "<tr><td>TVRI</td></tr><tr><td>RCTI</td></tr>"
        );
    }

    #[test]
    fn leading_comment_and_whitespace_are_kept() {
        let page = PageDocument::parse_str(PAGE);
        page.set_inner_html("header", "<!-- top -->\n  <nav>n</nav>");
        assert_eq!(
            page.inner_html("header").unwrap(),
            "<!-- top -->\n  <nav>n</nav>"
        );
    }

    #[test]
    fn set_inner_html_on_missing_slot_is_noop() {
        let page = PageDocument::parse_str(PAGE);
        assert!(!page.set_inner_html("sidebar", "<p>x</p>"));
        assert!(page.inner_html("sidebar").is_none());
    }

    #[test]
    fn inserted_nodes_point_at_new_parent() {
        let page = PageDocument::parse_str(PAGE);
        page.set_inner_html("footer", "<small>2025</small>");
        let footer = page.find_by_id("footer").unwrap();
        let child = footer.children.borrow()[0].clone();
        let parent = child.parent.take().and_then(|weak| weak.upgrade());
        assert!(parent.is_some_and(|parent| Rc::ptr_eq(&parent, &footer)));
    }

    #[test]
    fn charset_parameter_is_extracted() {
        assert_eq!(
            charset_from_content_type("text/html; charset=ISO-8859-1"),
            Some("ISO-8859-1")
        );
        assert_eq!(
            charset_from_content_type("text/html;charset=\"utf-8\""),
            Some("utf-8")
        );
        assert_eq!(charset_from_content_type("text/html"), None);
    }

    #[test]
    fn decode_text_honours_charset() {
        let latin1 = [0x43, 0x61, 0x66, 0xe9];
        assert_eq!(decode_text(&latin1, Some("iso-8859-1")), "Café");
        assert_eq!(decode_text("Café".as_bytes(), None), "Café");
    }
}

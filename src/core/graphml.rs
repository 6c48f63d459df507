//! GraphML encoding of slice graphs
//!
//! The writer emits a GraphML 1.0 document with a directed graph, typed
//! attribute keys, and one `<edge>` per row. The reader parses any GraphML
//! file into plain nodes, edges and attribute maps keyed by attribute name.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use aoi_common::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::core::aoi::Budget;
use crate::core::graph::SliceGraph;

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd";

struct KeySpec {
    id: &'static str,
    domain: &'static str,
    name: &'static str,
    kind: &'static str,
}

const KEYS: [KeySpec; 8] = [
    KeySpec { id: "d0", domain: "edge", name: "id", kind: "long" },
    KeySpec { id: "d1", domain: "edge", name: "cost", kind: "double" },
    KeySpec { id: "d2", domain: "edge", name: "geom", kind: "string" },
    KeySpec { id: "d3", domain: "graph", name: "mode", kind: "string" },
    KeySpec { id: "d4", domain: "graph", name: "profile", kind: "string" },
    KeySpec { id: "d5", domain: "graph", name: "origin_lon", kind: "double" },
    KeySpec { id: "d6", domain: "graph", name: "origin_lat", kind: "double" },
    KeySpec { id: "d7", domain: "graph", name: "budget", kind: "string" },
];

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::GraphFormat(e.to_string())
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(xml_error)
}

fn write_data<W: Write>(writer: &mut Writer<W>, key: &str, value: &str) -> Result<()> {
    emit(
        writer,
        Event::Start(BytesStart::new("data").with_attributes([("key", key)])),
    )?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new("data")))
}

/// Serialize a slice graph as GraphML
pub fn write_graph<W: Write>(graph: &SliceGraph, out: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new("graphml").with_attributes([
            ("xmlns", GRAPHML_NS),
            ("xmlns:xsi", XSI_NS),
            ("xsi:schemaLocation", SCHEMA_LOCATION),
        ])),
    )?;

    for key in &KEYS {
        emit(
            &mut writer,
            Event::Empty(BytesStart::new("key").with_attributes([
                ("id", key.id),
                ("for", key.domain),
                ("attr.name", key.name),
                ("attr.type", key.kind),
            ])),
        )?;
    }

    emit(
        &mut writer,
        Event::Start(
            BytesStart::new("graph").with_attributes([("id", "G"), ("edgedefault", "directed")]),
        ),
    )?;

    if let Some(metadata) = graph.metadata() {
        let budget = match metadata.aoi.budget {
            Budget::Minutes(minutes) => format!("{minutes}min"),
            Budget::RadiusKm(km) => format!("{km}km"),
        };
        write_data(&mut writer, "d3", metadata.mode.name())?;
        write_data(&mut writer, "d4", metadata.profile.name())?;
        write_data(&mut writer, "d5", &metadata.aoi.origin.lon.to_string())?;
        write_data(&mut writer, "d6", &metadata.aoi.origin.lat.to_string())?;
        write_data(&mut writer, "d7", &budget)?;
    }

    for node in graph.nodes() {
        let id = node.to_string();
        emit(
            &mut writer,
            Event::Empty(BytesStart::new("node").with_attributes([("id", id.as_str())])),
        )?;
    }

    for (index, edge) in graph.edges().iter().enumerate() {
        let edge_id = format!("e{index}");
        let source = edge.source.to_string();
        let target = edge.target.to_string();
        emit(
            &mut writer,
            Event::Start(BytesStart::new("edge").with_attributes([
                ("id", edge_id.as_str()),
                ("source", source.as_str()),
                ("target", target.as_str()),
            ])),
        )?;
        write_data(&mut writer, "d0", &edge.id.to_string())?;
        write_data(&mut writer, "d1", &edge.cost.to_string())?;
        write_data(&mut writer, "d2", &edge.geometry)?;
        emit(&mut writer, Event::End(BytesEnd::new("edge")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("graph")))?;
    emit(&mut writer, Event::End(BytesEnd::new("graphml")))?;

    let mut out = writer.into_inner();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Write a slice graph to a GraphML file, replacing any existing file
pub fn write_graph_file(graph: &SliceGraph, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_graph(graph, BufWriter::new(file))
}

/// A parsed GraphML edge
#[derive(Debug, Clone, PartialEq)]
pub struct GraphmlEdge {
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    pub data: BTreeMap<String, String>,
}

/// A parsed GraphML graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphmlDocument {
    pub directed: bool,
    pub graph_data: BTreeMap<String, String>,
    pub nodes: Vec<String>,
    pub edges: Vec<GraphmlEdge>,
}

impl GraphmlDocument {
    pub fn node_set(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(String::as_str).collect()
    }
}

enum Scope {
    Graph,
    Node,
    Edge(usize),
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name {
            let value = attr.unescape_value().map_err(xml_error)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(element: &BytesStart<'_>, name: &str) -> Result<String> {
    attribute(element, name.as_bytes())?.ok_or_else(|| {
        Error::GraphFormat(format!(
            "<{}> without '{name}' attribute",
            String::from_utf8_lossy(element.local_name().as_ref())
        ))
    })
}

fn parse_edge(element: &BytesStart<'_>) -> Result<GraphmlEdge> {
    let edge = GraphmlEdge {
        id: attribute(element, b"id")?,
        source: required_attribute(element, "source")?,
        target: required_attribute(element, "target")?,
        data: BTreeMap::new(),
    };
    if attribute(element, b"directed")?.as_deref() == Some("false") {
        return Err(Error::GraphFormat(format!(
            "edge {} -> {} is undirected",
            edge.source, edge.target
        )));
    }
    Ok(edge)
}

/// Parse a GraphML document.
///
/// Fails on undirected graphs and on edges that reference undeclared nodes.
pub fn read_graph<R: BufRead>(input: R) -> Result<GraphmlDocument> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();

    let mut doc = GraphmlDocument::default();
    let mut saw_graph = false;
    let mut key_names: HashMap<String, String> = HashMap::new();
    let mut scope = Scope::Graph;
    let mut data_key: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"key" => {
                let id = required_attribute(&e, "id")?;
                let name = attribute(&e, b"attr.name")?.unwrap_or_else(|| id.clone());
                key_names.insert(id, name);
            }
            Event::Start(e) if e.local_name().as_ref() == b"graph" => {
                saw_graph = true;
                doc.directed = attribute(&e, b"edgedefault")?.as_deref() == Some("directed");
            }
            Event::Start(e) if e.local_name().as_ref() == b"node" => {
                doc.nodes.push(required_attribute(&e, "id")?);
                scope = Scope::Node;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"node" => {
                doc.nodes.push(required_attribute(&e, "id")?);
            }
            Event::End(e) if e.local_name().as_ref() == b"node" => {
                scope = Scope::Graph;
            }
            Event::Start(e) if e.local_name().as_ref() == b"edge" => {
                doc.edges.push(parse_edge(&e)?);
                scope = Scope::Edge(doc.edges.len() - 1);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"edge" => {
                doc.edges.push(parse_edge(&e)?);
            }
            Event::End(e) if e.local_name().as_ref() == b"edge" => {
                scope = Scope::Graph;
            }
            Event::Start(e) if e.local_name().as_ref() == b"data" => {
                data_key = Some(required_attribute(&e, "key")?);
                text.clear();
            }
            Event::Text(t) if data_key.is_some() => {
                text.push_str(&t.unescape().map_err(xml_error)?);
            }
            Event::CData(c) if data_key.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(e) if e.local_name().as_ref() == b"data" => {
                if let Some(key) = data_key.take() {
                    let name = key_names.get(&key).cloned().unwrap_or(key);
                    let value = text.trim().to_string();
                    match scope {
                        Scope::Graph => {
                            doc.graph_data.insert(name, value);
                        }
                        Scope::Edge(index) => {
                            doc.edges[index].data.insert(name, value);
                        }
                        Scope::Node => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_graph {
        return Err(Error::GraphFormat("document has no <graph>".to_string()));
    }
    if !doc.directed {
        return Err(Error::GraphFormat("graph is not directed".to_string()));
    }
    check_endpoints(&doc)?;
    Ok(doc)
}

fn check_endpoints(doc: &GraphmlDocument) -> Result<()> {
    let nodes = doc.node_set();
    for edge in &doc.edges {
        for end in [&edge.source, &edge.target] {
            if !nodes.contains(end.as_str()) {
                return Err(Error::GraphFormat(format!(
                    "edge references undeclared node '{end}'"
                )));
            }
        }
    }
    Ok(())
}

/// Parse a GraphML file
pub fn read_graph_file(path: &Path) -> Result<GraphmlDocument> {
    let file = File::open(path)?;
    read_graph(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aoi::{AreaOfInterest, Coordinate, Profile};
    use crate::core::graph::{SliceMetadata, SliceMode};
    use crate::core::model::EdgeRecord;

    fn sample_graph() -> SliceGraph {
        let edges = vec![
            EdgeRecord {
                id: 11,
                source: 1,
                target: 2,
                cost: 42.5,
                geometry: "LINESTRING(0 0,1 1)".to_string(),
            },
            EdgeRecord {
                id: 12,
                source: 2,
                target: 3,
                cost: 7.0,
                geometry: "LINESTRING(1 1,2 2)".to_string(),
            },
        ];
        SliceGraph::from_edges(edges).with_metadata(SliceMetadata {
            mode: SliceMode::Isochrone,
            profile: Profile::Default,
            aoi: AreaOfInterest::new(
                Coordinate::new(-93.63, 41.99).unwrap(),
                Budget::Minutes(60),
            ),
        })
    }

    fn encode(graph: &SliceGraph) -> String {
        let mut out = Vec::new();
        write_graph(graph, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_written_document_shape() {
        let xml = encode(&sample_graph());
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("edgedefault=\"directed\""));
        assert!(xml.contains("attr.name=\"cost\" attr.type=\"double\""));
        assert!(xml.contains("<node id=\"3\"/>"));
        assert!(xml.contains("source=\"1\" target=\"2\""));
    }

    #[test]
    fn test_read_back_written_graph() {
        let xml = encode(&sample_graph());
        let doc = read_graph(xml.as_bytes()).unwrap();

        assert!(doc.directed);
        assert_eq!(doc.nodes, vec!["1", "2", "3"]);
        assert_eq!(doc.edges.len(), 2);
        assert_eq!(doc.edges[0].data["id"], "11");
        assert_eq!(doc.edges[0].data["cost"], "42.5");
        assert_eq!(doc.edges[1].data["geom"], "LINESTRING(1 1,2 2)");
        assert_eq!(doc.graph_data["mode"], "isochrone");
        assert_eq!(doc.graph_data["budget"], "60min");
        assert_eq!(doc.graph_data["origin_lon"], "-93.63");
    }

    #[test]
    fn test_writing_is_repeatable() {
        assert_eq!(encode(&sample_graph()), encode(&sample_graph()));
    }

    #[test]
    fn test_empty_graph_is_valid_graphml() {
        let xml = encode(&SliceGraph::from_edges(Vec::new()));
        let doc = read_graph(xml.as_bytes()).unwrap();
        assert!(doc.directed);
        assert!(doc.nodes.is_empty());
        assert!(doc.edges.is_empty());
        assert!(doc.graph_data.is_empty());
    }

    #[test]
    fn test_text_is_escaped() {
        let graph = SliceGraph::from_edges(vec![EdgeRecord {
            id: 1,
            source: 1,
            target: 2,
            cost: 1.0,
            geometry: "<&>".to_string(),
        }]);
        let xml = encode(&graph);
        assert!(xml.contains("&lt;&amp;&gt;"));
        let doc = read_graph(xml.as_bytes()).unwrap();
        assert_eq!(doc.edges[0].data["geom"], "<&>");
    }

    #[test]
    fn test_reader_rejects_undirected() {
        let xml = r#"<graphml><graph edgedefault="undirected"><node id="a"/></graph></graphml>"#;
        assert!(matches!(
            read_graph(xml.as_bytes()),
            Err(Error::GraphFormat(_))
        ));
    }

    #[test]
    fn test_reader_rejects_dangling_edge() {
        let xml = r#"<graphml><graph edgedefault="directed"><node id="a"/><edge source="a" target="b"/></graph></graphml>"#;
        let err = read_graph(xml.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("undeclared node 'b'"));
    }

    #[test]
    fn test_reader_accepts_foreign_key_ids() {
        let xml = r#"<?xml version="1.0"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="w" for="edge" attr.name="cost" attr.type="double"/>
  <graph edgedefault="directed">
    <node id="n0"/>
    <node id="n1"/>
    <edge source="n0" target="n1"><data key="w">3.5</data></edge>
  </graph>
</graphml>"#;
        let doc = read_graph(xml.as_bytes()).unwrap();
        assert_eq!(doc.edges[0].data["cost"], "3.5");
        assert_eq!(doc.edges[0].id, None);
    }
}

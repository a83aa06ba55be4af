//! Declaration index backed by a Doxygen XML export.
//!
//! `index.xml` lists every compound together with the ids of its members.
//! Each compound lives in `<refid>.xml`; it is only parsed when the builder
//! asks for it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::xml::{self, Element};
use super::{
    BaseDecl, CompoundDecl, CompoundHandle, CompoundKind, DeclarationIndex, EnumeratorDecl,
    MemberDecl, MemberKind, ParamDecl,
};
use crate::error::IndexError;
use crate::types::{Access, Virtuality};

#[derive(Debug, Clone)]
struct IndexEntry {
    refid: String,
    kind: CompoundKind,
}

/// A Doxygen XML output directory.
#[derive(Debug, Clone)]
pub struct DoxygenIndex {
    dir: PathBuf,
    entries: Vec<IndexEntry>,
    /// Compound and member ids mapped to qualified names.
    names: HashMap<String, String>,
}

fn read_document(path: &Path) -> Result<Element, IndexError> {
    let text = fs::read_to_string(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    xml::parse(&text).map_err(|message| IndexError::Xml {
        path: path.to_path_buf(),
        message,
    })
}

/// Header path as it would be written in an `#include`, from a source location.
fn include_path(file: &str) -> String {
    let file = file.replace('\\', "/");
    match file.rfind("include/") {
        Some(at) => file[at + "include/".len()..].to_string(),
        None => file,
    }
}

/// Owning compound id of a member id (`classosg_1_1Node_1a0f..` -> `classosg_1_1Node`).
fn owner_refid(member_id: &str) -> Option<&str> {
    member_id.rsplit_once("_1").map(|(owner, _)| owner)
}

impl DoxygenIndex {
    /// Load `index.xml` from a Doxygen XML output directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, IndexError> {
        let dir = dir.as_ref().to_path_buf();
        let index_path = dir.join("index.xml");
        let root = read_document(&index_path)?;
        if root.name != "doxygenindex" {
            return Err(IndexError::NotAnIndex(index_path));
        }

        let mut entries = Vec::new();
        let mut names = HashMap::new();
        for compound in root.children_named("compound") {
            let (Some(refid), Some(kind)) = (compound.attr("refid"), compound.attr("kind")) else {
                continue;
            };
            let Some(kind) = CompoundKind::from_doxygen(kind) else {
                // files, directories, pages and groups describe no types
                continue;
            };
            let Some(name) = compound.child_text("name") else {
                continue;
            };

            for member in compound.children_named("member") {
                if let (Some(member_id), Some(member_name)) =
                    (member.attr("refid"), member.child_text("name"))
                {
                    names
                        .entry(member_id.to_string())
                        .or_insert_with(|| format!("{name}::{member_name}"));
                }
            }
            names.insert(refid.to_string(), name);
            entries.push(IndexEntry {
                refid: refid.to_string(),
                kind,
            });
        }

        Ok(Self {
            dir,
            entries,
            names,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Text of a type element with `<ref>`s replaced by the qualified names they link to.
    fn type_text(&self, element: Option<&Element>) -> String {
        let Some(element) = element else {
            return String::new();
        };
        element.text_with(&|e| {
            if e.name != "ref" {
                return None;
            }
            e.attr("refid").and_then(|id| self.names.get(id)).cloned()
        })
    }

    fn parse_compound(&self, entry: &IndexEntry, def: &Element) -> CompoundDecl {
        let name = def
            .child_text("compoundname")
            .or_else(|| self.names.get(&entry.refid).cloned())
            .unwrap_or_else(|| entry.refid.clone());

        let mut compound = CompoundDecl::new(name, entry.kind);
        compound.access = def.attr("prot").map_or(Access::Public, Access::from_doxygen);
        compound.is_abstract = def.attr("abstract") == Some("yes");
        compound.header = def.child_text("includes").or_else(|| {
            def.child("location")
                .and_then(|l| l.attr("file"))
                .map(include_path)
        });

        if let Some(params) = def.child("templateparamlist") {
            compound.template_params = params
                .children_named("param")
                .map(|p| self.type_text(p.child("type")))
                .collect();
        }

        for base in def.children_named("basecompoundref") {
            let name = base
                .attr("refid")
                .and_then(|id| self.names.get(id))
                .cloned()
                .unwrap_or_else(|| base.text());
            compound.bases.push(BaseDecl {
                name,
                access: base.attr("prot").map_or(Access::Public, Access::from_doxygen),
                is_virtual: matches!(base.attr("virt"), Some("virtual" | "pure-virtual")),
            });
        }

        for section in def.children_named("sectiondef") {
            for member in section.children_named("memberdef") {
                if let Some(decl) = self.parse_member(&entry.refid, member) {
                    compound.members.push(decl);
                }
            }
        }

        compound
    }

    fn parse_member(&self, compound_refid: &str, def: &Element) -> Option<MemberDecl> {
        let name = def.child_text("name")?;
        let kind = match def.attr("kind")? {
            "function" => {
                let params = def
                    .children_named("param")
                    .map(|p| ParamDecl {
                        ty: self.type_text(p.child("type")),
                        name: p.child_text("declname"),
                        default: p.child("defval").map(|d| self.type_text(Some(d))),
                    })
                    // `f(void)`
                    .filter(|p| !(p.ty == "void" && p.name.is_none()))
                    .collect();
                MemberKind::Function {
                    return_type: self.type_text(def.child("type")),
                    params,
                    is_const: def.attr("const") == Some("yes"),
                    is_explicit: def.attr("explicit") == Some("yes"),
                    virtuality: Virtuality::from_doxygen(def.attr("virt").unwrap_or("non-virtual")),
                }
            }
            "variable" => {
                let mut ty = self.type_text(def.child("type"));
                if let Some(args) = def.child_text("argsstring") {
                    ty = format!("{ty} {args}");
                }
                MemberKind::Variable { ty }
            }
            "enum" => MemberKind::Enum {
                enumerators: def
                    .children_named("enumvalue")
                    .filter_map(|value| {
                        Some(EnumeratorDecl {
                            name: value.child_text("name")?,
                            initializer: value.child("initializer").map(|i| {
                                self.type_text(Some(i))
                                    .trim_start_matches('=')
                                    .trim()
                                    .to_string()
                            }),
                        })
                    })
                    .collect(),
                scoped: def.attr("strong") == Some("yes"),
            },
            "typedef" => {
                let mut target = self.type_text(def.child("type"));
                if let Some(args) = def.child_text("argsstring") {
                    target.push_str(&args);
                }
                MemberKind::Typedef { target }
            }
            _ => return None,
        };

        let declared_in = def
            .attr("id")
            .and_then(owner_refid)
            .filter(|owner| *owner != compound_refid)
            .and_then(|owner| self.names.get(owner))
            .cloned();

        Some(MemberDecl {
            name,
            kind,
            access: def.attr("prot").map_or(Access::Public, Access::from_doxygen),
            is_static: def.attr("static") == Some("yes"),
            declared_in,
            header: def
                .child("location")
                .and_then(|l| l.attr("file"))
                .map(include_path),
        })
    }
}

impl DeclarationIndex for DoxygenIndex {
    fn list_compounds(&self) -> Vec<CompoundHandle> {
        self.entries
            .iter()
            .map(|e| CompoundHandle(e.refid.clone()))
            .collect()
    }

    fn resolve_node(&self, handle: &CompoundHandle) -> Result<CompoundDecl, IndexError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.refid == handle.0)
            .ok_or_else(|| IndexError::UnknownHandle(handle.0.clone()))?;

        let path = self.dir.join(format!("{}.xml", entry.refid));
        let root = read_document(&path)?;
        let def = root
            .children_named("compounddef")
            .find(|d| d.attr("id") == Some(entry.refid.as_str()))
            .ok_or_else(|| IndexError::MissingCompound {
                path: path.clone(),
                refid: entry.refid.clone(),
            })?;

        Ok(self.parse_compound(entry, def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INDEX: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='no'?>
<doxygenindex version="1.9.1">
  <compound refid="classosg_1_1Object" kind="class"><name>osg::Object</name>
    <member refid="classosg_1_1Object_1a01" kind="function"><name>getName</name></member>
  </compound>
  <compound refid="classosg_1_1Node" kind="class"><name>osg::Node</name>
    <member refid="classosg_1_1Node_1a02" kind="enum"><name>Mode</name></member>
    <member refid="classosg_1_1Node_1a03" kind="enumvalue"><name>ON</name></member>
  </compound>
  <compound refid="Node_8h" kind="file"><name>Node.h</name></compound>
</doxygenindex>
"#;

    const NODE: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='no'?>
<doxygen version="1.9.1">
  <compounddef id="classosg_1_1Node" kind="class" language="C++" prot="public">
    <compoundname>osg::Node</compoundname>
    <basecompoundref refid="classosg_1_1Object" prot="public" virt="virtual">Object</basecompoundref>
    <includes local="no">osg/Node</includes>
    <sectiondef kind="public-type">
      <memberdef kind="enum" id="classosg_1_1Node_1a02" prot="public" static="no" strong="no">
        <name>Mode</name>
        <enumvalue id="classosg_1_1Node_1a03" prot="public"><name>ON</name><initializer>= 0x1</initializer></enumvalue>
        <enumvalue id="classosg_1_1Node_1a04" prot="public"><name>OFF</name></enumvalue>
      </memberdef>
    </sectiondef>
    <sectiondef kind="public-func">
      <memberdef kind="function" id="classosg_1_1Node_1a05" prot="public" static="no" const="no" explicit="no" inline="yes" virt="non-virtual">
        <type>void</type>
        <name>setParent</name>
        <argsstring>(Node *parent, Mode mode=ON)</argsstring>
        <param><type><ref refid="classosg_1_1Node" kindref="compound">Node</ref> *</type><declname>parent</declname></param>
        <param><type><ref refid="classosg_1_1Node_1a02" kindref="member">Mode</ref></type><declname>mode</declname><defval><ref refid="classosg_1_1Node_1a03" kindref="member">ON</ref></defval></param>
      </memberdef>
      <memberdef kind="function" id="classosg_1_1Object_1a01" prot="public" static="no" const="yes" explicit="no" inline="yes" virt="virtual">
        <type>const std::string &amp;</type>
        <name>getName</name>
        <argsstring>() const</argsstring>
      </memberdef>
      <memberdef kind="function" id="classosg_1_1Node_1a06" prot="public" static="no" const="no" explicit="no" inline="no" virt="non-virtual">
        <type>void</type>
        <name>reset</name>
        <param><type>void</type></param>
      </memberdef>
    </sectiondef>
    <location file="/src/OpenSceneGraph/include/osg/Node" line="30"/>
  </compounddef>
</doxygen>
"#;

    fn write_export() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.xml"), INDEX).unwrap();
        fs::write(dir.path().join("classosg_1_1Node.xml"), NODE).unwrap();
        dir
    }

    #[test]
    fn test_lists_type_compounds_only() {
        let dir = write_export();
        let index = DoxygenIndex::load(dir.path()).unwrap();
        let handles = index.list_compounds();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[1].as_str(), "classosg_1_1Node");
    }

    #[test]
    fn test_resolve_compound() {
        let dir = write_export();
        let index = DoxygenIndex::load(dir.path()).unwrap();
        let node = index
            .resolve_node(&CompoundHandle("classosg_1_1Node".to_string()))
            .unwrap();

        assert_eq!(node.name, "osg::Node");
        assert_eq!(node.kind, CompoundKind::Class);
        assert_eq!(node.header.as_deref(), Some("osg/Node"));
        assert_eq!(node.bases.len(), 1);
        assert_eq!(node.bases[0].name, "osg::Object");
        assert!(node.bases[0].is_virtual);
        assert_eq!(node.members.len(), 4);

        let MemberKind::Enum { enumerators, scoped } = &node.members[0].kind else {
            panic!("expected an enum");
        };
        assert!(!scoped);
        assert_eq!(enumerators[0].initializer.as_deref(), Some("0x1"));
        assert_eq!(enumerators[1].initializer, None);

        let MemberKind::Function { params, .. } = &node.members[1].kind else {
            panic!("expected a function");
        };
        assert_eq!(params[0].ty, "osg::Node *");
        assert_eq!(params[1].ty, "osg::Node::Mode");
        assert_eq!(params[1].default.as_deref(), Some("osg::Node::ON"));
    }

    #[test]
    fn test_inherited_member_and_void_params() {
        let dir = write_export();
        let index = DoxygenIndex::load(dir.path()).unwrap();
        let node = index
            .resolve_node(&CompoundHandle("classosg_1_1Node".to_string()))
            .unwrap();

        let get_name = &node.members[2];
        assert_eq!(get_name.declared_in.as_deref(), Some("osg::Object"));
        assert_eq!(node.members[1].declared_in, None);

        let MemberKind::Function { params, .. } = &node.members[3].kind else {
            panic!("expected a function");
        };
        assert!(params.is_empty());
    }

    #[test]
    fn test_missing_compound_file() {
        let dir = write_export();
        let index = DoxygenIndex::load(dir.path()).unwrap();
        let err = index
            .resolve_node(&CompoundHandle("classosg_1_1Object".to_string()))
            .unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
    }

    #[test]
    fn test_missing_index_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DoxygenIndex::load(dir.path()),
            Err(IndexError::Io { .. })
        ));

        fs::write(dir.path().join("index.xml"), "<doxygen/>").unwrap();
        assert!(matches!(
            DoxygenIndex::load(dir.path()),
            Err(IndexError::NotAnIndex(_))
        ));
    }

    #[test]
    fn test_include_path() {
        assert_eq!(include_path("/src/OpenSceneGraph/include/osg/Node"), "osg/Node");
        assert_eq!(include_path("osg/Node"), "osg/Node");
    }
}

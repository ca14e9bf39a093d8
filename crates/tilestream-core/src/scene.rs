//! A minimal model of the host's scene graph.
//!
//! The editor owns the real scene. These types describe only what the tile manager and the reconstructor read from it
//! (render roots of tile sets) and what they hand back to it (the collision proxy and reconstructed groups).

use crate::geometry::Transform;
use crate::glam::Affine3A;
use crate::mesh::{IndexedMesh, Material};
use crate::registry::{Registry32, RegistryId};

use std::rc::Rc;

/// Identifies a node inserted at the top level of a [`SceneGraph`].
pub type NodeId = RegistryId;

/// What a node is for. Synthetic roles are produced by this library rather than authored by the user.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeRole {
    Content,
    TilesGroup,
    CollisionProxy,
    ReconstructionGroup,
}

/// Capabilities the editor checks before selecting, exporting or listing a node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NodeFlags {
    pub selectable: bool,
    pub exportable: bool,
    /// Whether the node shows up in the scene tree panel.
    pub listed: bool,
    pub role: NodeRole,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::content()
    }
}

impl NodeFlags {
    pub fn content() -> Self {
        Self {
            selectable: true,
            exportable: true,
            listed: true,
            role: NodeRole::Content,
        }
    }

    /// Excluded from selection, export and listing.
    pub fn synthetic(role: NodeRole) -> Self {
        Self {
            selectable: false,
            exportable: false,
            listed: false,
            role,
        }
    }

    pub fn is_ignored(&self) -> bool {
        !(self.selectable || self.exportable || self.listed)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    pub name: String,
    /// Relative to the parent node.
    pub transform: Transform,
    pub visible: bool,
    pub flags: NodeFlags,
    pub mesh: Option<Rc<IndexedMesh>>,
    pub material: Option<Material>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: Rc<IndexedMesh>, material: Option<Material>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            mesh: Some(mesh),
            material,
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Depth-first visit of every visible node, with its world transform. An invisible node hides its whole subtree.
    pub fn visit_visible(&self, parent_to_world: &Affine3A, visitor: &mut impl FnMut(&SceneNode, &Affine3A)) {
        if !self.visible {
            return;
        }
        let to_world = *parent_to_world * self.transform.to_affine();
        visitor(self, &to_world);
        for child in self.children.iter() {
            child.visit_visible(&to_world, visitor);
        }
    }

    /// Visits every visible node that carries a mesh.
    pub fn visit_visible_meshes(
        &self,
        parent_to_world: &Affine3A,
        visitor: &mut impl FnMut(&IndexedMesh, &Affine3A),
    ) {
        self.visit_visible(parent_to_world, &mut |node, to_world| {
            if let Some(mesh) = node.mesh.as_ref() {
                visitor(mesh, to_world);
            }
        });
    }

    pub fn count_meshes(&self) -> usize {
        self.mesh.is_some() as usize + self.children.iter().map(|c| c.count_meshes()).sum::<usize>()
    }
}

/// The host's scene. Only top-level insertion and removal are needed here.
pub trait SceneGraph {
    fn insert(&mut self, node: SceneNode) -> NodeId;

    /// Returns `None` if `id` is not in the scene.
    fn remove(&mut self, id: NodeId) -> Option<SceneNode>;

    fn get(&self, id: NodeId) -> Option<&SceneNode>;
}

/// An in-memory [`SceneGraph`].
#[derive(Default)]
pub struct Scene {
    nodes: Registry32<SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Nodes that the editor's scene tree would show.
    pub fn listed(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().filter(|(_, n)| n.flags.listed)
    }
}

impl SceneGraph for Scene {
    fn insert(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        self.nodes.remove(id)
    }

    fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }
}

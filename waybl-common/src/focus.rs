use crate::scene::{NodeType, SceneNode};

/// Returns true if any container under `root` is visible.
///
/// Depth-first, pre-order, stopping at the first visible container or
/// floating container. An output with an empty workspace is unfocused.
pub fn is_output_focused(root: &SceneNode) -> bool {
    match root.node_type {
        NodeType::Container | NodeType::FloatingContainer if root.visible => {
            log::debug!("Visible node was: {:?}", root.name);
            true
        }
        _ => root.children.iter().any(is_output_focused),
    }
}

/// A focused output shows the sharp wallpaper, an unfocused one the blurred copy.
pub fn wants_blur(output: &SceneNode) -> bool {
    !is_output_focused(output)
}

//! Port descriptors for graph nodes.
//!
//! Each node kind declares its ports via static `PortDescriptor` arrays.
//! The builder uses these to validate links.

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for a node's port.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub direction: PortDirection,
}

impl PortDescriptor {
    pub const fn input(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
        }
    }

    pub const fn output(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
        }
    }
}

/// Find a port by name and direction.
pub fn find_port<'a>(
    ports: &'a [PortDescriptor],
    name: &str,
    direction: PortDirection,
) -> Option<&'a PortDescriptor> {
    ports
        .iter()
        .find(|p| p.name == name && p.direction == direction)
}

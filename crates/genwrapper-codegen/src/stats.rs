//! Aggregate counters over the emitted part of a registry.

use crate::registry::TypeRegistry;
use crate::types::{
    MethodVisibility, PropertyShape, PropertyVisibility, ReflectorDescriptor, ReflectorKind,
    ResolutionState, ValueKind,
};

/// Snapshot of what a generation run emitted.
///
/// Only eligible, consolidated descriptors are counted, the same set the
/// generator writes units for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total_reflectors: usize,
    pub num_typedefs: usize,
    pub num_custom: usize,
    pub num_object_types: usize,
    pub num_abstract_object_types: usize,
    pub num_value_types: usize,
    pub num_enums: usize,
    pub num_stdcontainers: usize,

    pub total_methods: usize,
    pub num_constructors: usize,
    pub num_static_methods: usize,
    pub num_protected_methods: usize,

    pub total_properties: usize,
    pub num_simple_properties: usize,
    pub num_array_properties: usize,
    pub num_indexed_properties: usize,
    pub num_public_properties: usize,
}

impl Statistics {
    pub fn collect(registry: &TypeRegistry) -> Self {
        let mut stats = Self::default();
        for (_, descriptor) in registry.iter() {
            if descriptor.eligible && descriptor.state == ResolutionState::Consolidated {
                stats.add(descriptor);
            }
        }
        stats
    }

    fn add(&mut self, descriptor: &ReflectorDescriptor) {
        self.total_reflectors += 1;
        match &descriptor.kind {
            ReflectorKind::Typedef { .. } => self.num_typedefs += 1,
            ReflectorKind::Custom { .. } => self.num_custom += 1,
            ReflectorKind::Object { is_abstract } => {
                self.num_object_types += 1;
                if *is_abstract {
                    self.num_abstract_object_types += 1;
                }
            }
            ReflectorKind::Value(value) => {
                self.num_value_types += 1;
                match value {
                    ValueKind::Enum { .. } => self.num_enums += 1,
                    ValueKind::StdContainer { .. } => self.num_stdcontainers += 1,
                    ValueKind::Plain => {}
                }
            }
        }

        for method in descriptor.wrapped_methods() {
            self.total_methods += 1;
            if method.is_constructor {
                self.num_constructors += 1;
            } else if method.is_static {
                self.num_static_methods += 1;
            } else if method.visibility == MethodVisibility::Protected {
                self.num_protected_methods += 1;
            }
        }

        for property in descriptor.wrapped_properties() {
            self.total_properties += 1;
            match property.shape {
                PropertyShape::Simple => self.num_simple_properties += 1,
                PropertyShape::Array => self.num_array_properties += 1,
                PropertyShape::Indexed => self.num_indexed_properties += 1,
            }
            if property.visibility == PropertyVisibility::Public {
                self.num_public_properties += 1;
            }
        }
    }
}

/// Integer percentage of `part` in `total`, rounded down; 0 for an empty total.
pub fn percent(part: usize, total: usize) -> usize {
    if total == 0 { 0 } else { 100 * part / total }
}

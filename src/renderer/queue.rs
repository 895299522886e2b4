use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use glam::{Mat4, Vec4};

use crate::asset::{Handle, RenderAssets, ShaderVariation};
use crate::graphics::{
    GraphicsDevice, InstanceTransform, InstancingBuffer, ParamId, VertexStream,
};
use crate::renderer::batch::{Batch, GeometryType, MAX_LIGHT_VS_VARIATIONS};
use crate::renderer::lights::LightQueue;
use crate::renderer::{Camera, Geometry, Material, Pass, RendererContext};

/// One member of an instance group: a world transform plus its distance from
/// the camera. The transform is owned by the scene object for the frame.
#[derive(Clone, Copy)]
pub struct InstanceData<'f> {
    pub world_transform: &'f Mat4,
    pub distance: f32,
}

/// Structural identity of an instance group. Two batches with the same
/// light queue, pass, material, and geometry belong to the same group no
/// matter what their transforms are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    light_queue: Option<u16>,
    pass: Handle<Pass>,
    material: Handle<Material>,
    geometry: Handle<Geometry>,
}

impl GroupKey {
    fn of(batch: &Batch) -> Self {
        Self {
            light_queue: batch.light_queue.map(|queue| queue.slot),
            pass: batch.pass,
            material: batch.material,
            geometry: batch.geometry,
        }
    }
}

/// Batches differing only by world transform, merged into one instanced
/// draw call when the group is large enough to pay off.
pub struct BatchGroup<'f> {
    pub geometry: Handle<Geometry>,
    pub material: Handle<Material>,
    pub pass: Handle<Pass>,
    pub vertex_shader: Option<Handle<ShaderVariation>>,
    pub pixel_shader: Option<Handle<ShaderVariation>>,
    pub vertex_shader_index: usize,
    pub camera: &'f Camera,
    pub light_queue: Option<&'f LightQueue<'f>>,
    pub instances: Vec<InstanceData<'f>>,
    /// Where this group's transforms start in the shared instancing buffer,
    /// once [`set_transforms`](Self::set_transforms) has written them.
    pub start_index: Option<u32>,
}

impl<'f> BatchGroup<'f> {
    fn from_batch(batch: &Batch<'f>) -> Self {
        Self {
            geometry: batch.geometry,
            material: batch.material,
            pass: batch.pass,
            vertex_shader: batch.vertex_shader,
            pixel_shader: batch.pixel_shader,
            vertex_shader_index: batch.vertex_shader_index,
            camera: batch.camera,
            light_queue: batch.light_queue,
            instances: vec![InstanceData {
                world_transform: batch.world_transform,
                distance: batch.distance,
            }],
            start_index: None,
        }
    }

    /// Size and triangle-count gate for drawing instanced. Below the gate
    /// the group renders as individual draws instead.
    fn meets_instancing_threshold(
        &self,
        assets: &RenderAssets,
        renderer: &RendererContext,
    ) -> bool {
        if (self.instances.len() as u32) < renderer.min_instance_group_size() {
            return false;
        }
        let Some(geometry) = assets.geometries.get(self.geometry) else {
            return false;
        };
        geometry.index_count() <= renderer.max_instance_indices()
    }

    /// Writes this group's transforms into the locked instancing buffer
    /// region, starting at `free_index` and advancing it. Groups below the
    /// instancing threshold do not use up buffer space.
    pub fn set_transforms(
        &mut self,
        assets: &RenderAssets,
        renderer: &RendererContext,
        dest: &mut [InstanceTransform],
        free_index: &mut u32,
    ) {
        if !self.meets_instancing_threshold(assets, renderer) {
            return;
        }

        let start = *free_index as usize;
        let Some(target) = dest.get_mut(start..start + self.instances.len()) else {
            log::warn!(
                "Instancing buffer region too small for group of {} at index {}; \
                 group falls back to individual draws",
                self.instances.len(),
                start
            );
            return;
        };

        for (slot, instance) in target.iter_mut().zip(&self.instances) {
            *slot = InstanceTransform::from_matrix(instance.world_transform);
        }

        self.start_index = Some(*free_index);
        *free_index += self.instances.len() as u32;
    }

    /// A batch standing in for the whole group during state setup. The
    /// model transform is never pushed from it; instanced draws read
    /// transforms from the instance stream, fallback draws push per
    /// instance.
    fn representative_batch(&self, first: &InstanceData<'f>) -> Batch<'f> {
        Batch {
            geometry: self.geometry,
            material: self.material,
            pass: self.pass,
            vertex_shader: self.vertex_shader,
            pixel_shader: self.pixel_shader,
            vertex_shader_index: self.vertex_shader_index,
            geometry_type: GeometryType::Static,
            world_transform: first.world_transform,
            camera: self.camera,
            light_queue: self.light_queue,
            shader_data: None,
            override_view: false,
            has_priority: false,
            distance: first.distance,
            sort_key: 0,
        }
    }

    /// Issues the group's draw calls: one instanced draw (or a few, when
    /// the transforms have to be streamed through the buffer in chunks), or
    /// the per-instance fallback when instancing is unavailable or not
    /// worth it.
    pub fn draw(
        &self,
        graphics: &mut dyn GraphicsDevice,
        renderer: &RendererContext,
        instancing: Option<&mut dyn InstancingBuffer>,
        assets: &RenderAssets,
        global_params: &HashMap<ParamId, Vec4>,
    ) {
        let Some(first) = self.instances.first() else {
            return;
        };
        let Some(geometry) = assets.geometries.get(self.geometry) else {
            return;
        };
        let batch = self.representative_batch(first);

        match instancing {
            Some(buffer) if self.meets_instancing_threshold(assets, renderer) => {
                self.draw_instanced(graphics, renderer, buffer, assets, global_params, geometry, batch);
            }
            _ => {
                self.draw_individually(graphics, renderer, assets, global_params, geometry, batch);
            }
        }
    }

    fn draw_individually(
        &self,
        graphics: &mut dyn GraphicsDevice,
        renderer: &RendererContext,
        assets: &RenderAssets,
        global_params: &HashMap<ParamId, Vec4>,
        geometry: &Geometry,
        batch: Batch<'f>,
    ) {
        if batch.vertex_shader.is_none() || batch.pixel_shader.is_none() {
            return;
        }
        batch.prepare(graphics, renderer, assets, global_params, false);

        graphics.set_index_buffer(geometry.index_buffer());
        graphics.set_vertex_streams(geometry.streams(), 0);

        for instance in &self.instances {
            graphics.set_parameter_matrix(ParamId::Model, instance.world_transform);
            graphics.draw(
                geometry.primitive_type(),
                geometry.index_start(),
                geometry.index_count(),
                geometry.vertex_start(),
                geometry.vertex_count(),
            );
        }

        graphics.clear_transform_sources();
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_instanced(
        &self,
        graphics: &mut dyn GraphicsDevice,
        renderer: &RendererContext,
        buffer: &mut dyn InstancingBuffer,
        assets: &RenderAssets,
        global_params: &HashMap<ParamId, Vec4>,
        geometry: &Geometry,
        mut batch: Batch<'f>,
    ) {
        // Switch to the instancing vertex shader variant. Forward-lit
        // passes index their lists by both geometry type and light
        // variation, so the instanced block sits at a different stride.
        if let Some(pass) = assets.passes.get(self.pass) {
            let index = if pass.pass_type().is_forward_lit() {
                self.vertex_shader_index
                    + GeometryType::Instanced as usize * MAX_LIGHT_VS_VARIATIONS
            } else {
                self.vertex_shader_index + GeometryType::Instanced as usize
            };
            batch.vertex_shader = pass.vertex_shaders().get(index).copied();
        }
        if batch.vertex_shader.is_none() || batch.pixel_shader.is_none() {
            log::debug!("No instancing shader variant; skipping group draw");
            return;
        }

        batch.prepare(graphics, renderer, assets, global_params, false);

        // Compose the stream list for this call only; the geometry's own
        // streams are never mutated.
        let mut streams: Vec<VertexStream> = Vec::with_capacity(geometry.streams().len() + 1);
        streams.extend_from_slice(geometry.streams());
        streams.push(buffer.stream());

        match self.start_index {
            // Buffer not pre-filled: stream transforms through it in chunks
            // bounded by its capacity.
            None => {
                let capacity = buffer.transform_count().max(1) as usize;
                let mut start = 0;
                while start < self.instances.len() {
                    let count = (self.instances.len() - start).min(capacity);
                    let chunk = &self.instances[start..start + count];

                    let locked = buffer.write_discard(count as u32, &mut |dest| {
                        for (slot, instance) in dest.iter_mut().zip(chunk) {
                            *slot = InstanceTransform::from_matrix(instance.world_transform);
                        }
                    });
                    if !locked {
                        // Abandon the remaining instances for this call.
                        // The stream list above is transient, so there is
                        // no shared state to restore.
                        log::warn!(
                            "Instancing buffer lock failed; dropping {} instances",
                            self.instances.len() - start
                        );
                        return;
                    }

                    graphics.set_index_buffer(geometry.index_buffer());
                    graphics.set_vertex_streams(&streams, 0);
                    graphics.draw_instanced(
                        geometry.primitive_type(),
                        geometry.index_start(),
                        geometry.index_count(),
                        geometry.vertex_start(),
                        geometry.vertex_count(),
                        count as u32,
                    );

                    start += count;
                }
            }
            // Pre-filled at a known offset: a single instanced draw.
            Some(start_index) => {
                graphics.set_index_buffer(geometry.index_buffer());
                graphics.set_vertex_streams(&streams, start_index);
                graphics.draw_instanced(
                    geometry.primitive_type(),
                    geometry.index_start(),
                    geometry.index_count(),
                    geometry.vertex_start(),
                    geometry.vertex_count(),
                    self.instances.len() as u32,
                );
            }
        }
    }
}

/// Per-pass collection of draw batches for one frame.
///
/// Non-instanceable batches go to a flat list; instanceable batches merge
/// into groups keyed by structural identity, with priority batches kept in
/// their own group map so sorting never interleaves them with normal ones.
/// The sorted views are index sequences into the owned storage; they go
/// stale when more batches are added and are invalidated by [`clear`].
///
/// [`clear`]: Self::clear
#[derive(Default)]
pub struct BatchQueue<'f> {
    batches: Vec<Batch<'f>>,
    groups: Vec<BatchGroup<'f>>,
    group_lookup: HashMap<GroupKey, usize>,
    priority_groups: Vec<BatchGroup<'f>>,
    priority_group_lookup: HashMap<GroupKey, usize>,
    sorted_batches: Vec<usize>,
    sorted_priority_batches: Vec<usize>,
    sorted_groups: Vec<usize>,
    sorted_priority_groups: Vec<usize>,
}

impl<'f> BatchQueue<'f> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all accumulated batches and groups for the next frame.
    pub fn clear(&mut self) {
        self.batches.clear();
        self.groups.clear();
        self.group_lookup.clear();
        self.priority_groups.clear();
        self.priority_group_lookup.clear();
        self.sorted_batches.clear();
        self.sorted_priority_batches.clear();
        self.sorted_groups.clear();
        self.sorted_priority_groups.clear();
    }

    /// Adds a batch, merging it into an instance group when eligible.
    pub fn add_batch(&mut self, batch: Batch<'f>, force_no_instancing: bool) {
        if force_no_instancing || !batch.is_instancing_eligible() {
            self.batches.push(batch);
            return;
        }

        let key = GroupKey::of(&batch);
        let (groups, lookup) = if batch.has_priority {
            (&mut self.priority_groups, &mut self.priority_group_lookup)
        } else {
            (&mut self.groups, &mut self.group_lookup)
        };

        match lookup.entry(key) {
            Entry::Occupied(entry) => {
                groups[*entry.get()].instances.push(InstanceData {
                    world_transform: batch.world_transform,
                    distance: batch.distance,
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(groups.len());
                groups.push(BatchGroup::from_batch(&batch));
            }
        }
    }

    /// Sorts flat batches for correct alpha blending: farthest first, with
    /// the sort key breaking exact distance ties so state-compatible draws
    /// stay adjacent. Groups are listed but not reordered; a group renders
    /// as one atomic draw.
    pub fn sort_back_to_front(&mut self) {
        self.sorted_priority_batches.clear();
        self.sorted_batches.clear();
        self.sorted_batches.extend(0..self.batches.len());

        let batches = &self.batches;
        self.sorted_batches
            .sort_by(|&a, &b| compare_back_to_front(&batches[a], &batches[b]));

        self.sorted_priority_groups.clear();
        self.sorted_priority_groups.extend(0..self.priority_groups.len());
        self.sorted_groups.clear();
        self.sorted_groups.extend(0..self.groups.len());
    }

    /// Sorts for overdraw reduction: state-compatible batches clustered by
    /// descending sort key, nearest first within a cluster. Priority and
    /// normal batches are partitioned before sorting so their orders never
    /// depend on each other. Each group's instances sort nearest-first and
    /// the groups order by their nearest instance.
    pub fn sort_front_to_back(&mut self) {
        self.sorted_priority_batches.clear();
        self.sorted_batches.clear();

        for (index, batch) in self.batches.iter().enumerate() {
            if batch.has_priority {
                self.sorted_priority_batches.push(index);
            } else {
                self.sorted_batches.push(index);
            }
        }

        let batches = &self.batches;
        self.sorted_priority_batches
            .sort_by(|&a, &b| compare_front_to_back(&batches[a], &batches[b]));
        self.sorted_batches
            .sort_by(|&a, &b| compare_front_to_back(&batches[a], &batches[b]));

        for group in self.priority_groups.iter_mut().chain(self.groups.iter_mut()) {
            group.instances.sort_by(|a, b| {
                a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal)
            });
        }

        self.sorted_priority_groups.clear();
        self.sorted_priority_groups.extend(0..self.priority_groups.len());
        self.sorted_groups.clear();
        self.sorted_groups.extend(0..self.groups.len());

        let priority_groups = &self.priority_groups;
        self.sorted_priority_groups.sort_by(|&a, &b| {
            compare_groups_front_to_back(&priority_groups[a], &priority_groups[b])
        });
        let groups = &self.groups;
        self.sorted_groups
            .sort_by(|&a, &b| compare_groups_front_to_back(&groups[a], &groups[b]));
    }

    /// Writes every eligible group's transforms into the locked instancing
    /// buffer, priority groups first, advancing `free_index` past each.
    pub fn set_transforms(
        &mut self,
        assets: &RenderAssets,
        renderer: &RendererContext,
        dest: &mut [InstanceTransform],
        free_index: &mut u32,
    ) {
        for group in self.priority_groups.iter_mut().chain(self.groups.iter_mut()) {
            group.set_transforms(assets, renderer, dest, free_index);
        }
    }

    /// Transform slots the instancing buffer must hold for this queue:
    /// the instance counts of eligible groups only, so the caller can size
    /// the buffer to exactly what [`set_transforms`](Self::set_transforms)
    /// will write.
    pub fn num_instances(&self, assets: &RenderAssets, renderer: &RendererContext) -> u32 {
        self.priority_groups
            .iter()
            .chain(self.groups.iter())
            .filter(|group| group.meets_instancing_threshold(assets, renderer))
            .map(|group| group.instances.len() as u32)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.groups.is_empty() && self.priority_groups.is_empty()
    }

    /// Flat batches in accumulation order.
    pub fn batches(&self) -> &[Batch<'f>] {
        &self.batches
    }

    /// Normal instance groups in creation order.
    pub fn groups(&self) -> impl Iterator<Item = &BatchGroup<'f>> {
        self.groups.iter()
    }

    /// Priority instance groups in creation order.
    pub fn priority_groups(&self) -> impl Iterator<Item = &BatchGroup<'f>> {
        self.priority_groups.iter()
    }

    /// Non-priority flat batches in last-sorted order.
    pub fn sorted_batches(&self) -> impl Iterator<Item = &Batch<'f>> {
        self.sorted_batches.iter().map(move |&index| &self.batches[index])
    }

    /// Priority flat batches in last-sorted order (empty after a
    /// back-to-front sort, which does not partition).
    pub fn sorted_priority_batches(&self) -> impl Iterator<Item = &Batch<'f>> {
        self.sorted_priority_batches
            .iter()
            .map(move |&index| &self.batches[index])
    }

    /// Normal groups in last-sorted order.
    pub fn sorted_groups(&self) -> impl Iterator<Item = &BatchGroup<'f>> {
        self.sorted_groups.iter().map(move |&index| &self.groups[index])
    }

    /// Priority groups in last-sorted order.
    pub fn sorted_priority_groups(&self) -> impl Iterator<Item = &BatchGroup<'f>> {
        self.sorted_priority_groups
            .iter()
            .map(move |&index| &self.priority_groups[index])
    }
}

fn compare_front_to_back(a: &Batch, b: &Batch) -> Ordering {
    if a.sort_key == b.sort_key {
        a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal)
    } else {
        b.sort_key.cmp(&a.sort_key)
    }
}

fn compare_back_to_front(a: &Batch, b: &Batch) -> Ordering {
    if a.distance == b.distance {
        b.sort_key.cmp(&a.sort_key)
    } else {
        b.distance.partial_cmp(&a.distance).unwrap_or(Ordering::Equal)
    }
}

fn compare_groups_front_to_back(a: &BatchGroup, b: &BatchGroup) -> Ordering {
    let da = a.instances.first().map(|i| i.distance).unwrap_or(0.0);
    let db = b.instances.first().map(|i| i.distance).unwrap_or(0.0);
    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
}

//! Post-transform vertex cache optimization.
//!
//! The default optimizer follows Tom Forsyth's linear-speed vertex cache
//! optimization: triangles are emitted greedily by a score that favours
//! vertices already in a simulated LRU cache and vertices with few remaining
//! triangles. Vertices are then renumbered in first-use order so the vertex
//! fetch is linear too.

use log::warn;

use crate::raw::RawVertex;

/// Reorders a triangle list (and its vertices) in place. The result must describe
/// the same triangles over the same vertex set.
pub trait VertexCacheOptimizer: Sync {
    fn optimize(&self, vertices: &mut [RawVertex], indices: &mut [u32]);
}

/// Leaves both arrays untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityOptimizer;

impl VertexCacheOptimizer for IdentityOptimizer {
    fn optimize(&self, _vertices: &mut [RawVertex], _indices: &mut [u32]) {}
}

/// Cache behaviour of an index list replayed through an LRU cache of `cache_size` entries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexCacheStats {
    /// Average cache misses per triangle, 0.5 at best for large meshes and 3 at worst.
    pub acmr: f32,
    /// Average transforms per referenced vertex, 1 at best.
    pub atvr: f32,
    pub cache_size: usize,
}

impl VertexCacheStats {
    pub fn measure(indices: &[u32], cache_size: usize) -> Self {
        let mut cache: Vec<u32> = Vec::with_capacity(cache_size + 1);
        let mut misses = 0usize;
        let mut referenced = std::collections::HashSet::new();
        for &index in indices {
            referenced.insert(index);
            match cache.iter().position(|v| *v == index) {
                Some(hit) => {
                    cache.remove(hit);
                }
                None => misses += 1,
            }
            cache.insert(0, index);
            cache.truncate(cache_size);
        }
        let triangles = indices.len() / 3;
        Self {
            acmr: if triangles == 0 { 0.0 } else { misses as f32 / triangles as f32 },
            atvr: if referenced.is_empty() { 0.0 } else { misses as f32 / referenced.len() as f32 },
            cache_size,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForsythOptimizer {
    pub cache_size: usize,
}

impl Default for ForsythOptimizer {
    fn default() -> Self {
        Self { cache_size: 32 }
    }
}

const CACHE_DECAY_POWER: f32 = 1.5;
const LAST_TRI_SCORE: f32 = 0.75;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = 0.5;

impl ForsythOptimizer {
    fn vertex_score(&self, cache_position: Option<usize>, remaining: u32) -> f32 {
        if remaining == 0 {
            return -1.0;
        }
        let mut score = match cache_position {
            Some(position) if position < 3 => LAST_TRI_SCORE,
            Some(position) if position < self.cache_size => {
                let scaler = 1.0 / (self.cache_size - 3) as f32;
                (1.0 - (position - 3) as f32 * scaler).powf(CACHE_DECAY_POWER)
            }
            _ => 0.0,
        };
        score += VALENCE_BOOST_SCALE * (remaining as f32).powf(-VALENCE_BOOST_POWER);
        score
    }

    /// Returns the new triangle order as indices into the input triangles.
    fn triangle_order(&self, vertex_count: usize, indices: &[u32]) -> Vec<usize> {
        let triangle_count = indices.len() / 3;

        // vertex -> triangles using it, as a flattened adjacency list
        let mut remaining = vec![0u32; vertex_count];
        for &v in indices {
            remaining[v as usize] += 1;
        }
        let mut offsets = vec![0usize; vertex_count + 1];
        for v in 0..vertex_count {
            offsets[v + 1] = offsets[v] + remaining[v] as usize;
        }
        let mut adjacency = vec![0usize; indices.len()];
        let mut fill = offsets.clone();
        for (i, &v) in indices.iter().enumerate() {
            adjacency[fill[v as usize]] = i / 3;
            fill[v as usize] += 1;
        }

        let mut cache_position: Vec<Option<usize>> = vec![None; vertex_count];
        let mut vertex_scores: Vec<f32> = (0..vertex_count)
            .map(|v| self.vertex_score(None, remaining[v]))
            .collect();
        let mut added = vec![false; triangle_count];
        let mut triangle_scores: Vec<f32> = (0..triangle_count)
            .map(|t| indices[t * 3..t * 3 + 3].iter().map(|&v| vertex_scores[v as usize]).sum())
            .collect();

        let mut cache: Vec<u32> = Vec::with_capacity(self.cache_size + 3);
        let mut order = Vec::with_capacity(triangle_count);
        let mut best = (0..triangle_count).max_by(|a, b| triangle_scores[*a].total_cmp(&triangle_scores[*b]));
        let mut cursor = 0usize;

        while let Some(triangle) = best {
            order.push(triangle);
            added[triangle] = true;
            let corners = [indices[triangle * 3], indices[triangle * 3 + 1], indices[triangle * 3 + 2]];

            for &v in &corners {
                let v = v as usize;
                let used = &mut adjacency[offsets[v]..offsets[v] + remaining[v] as usize];
                if let Some(slot) = used.iter().position(|t| *t == triangle) {
                    let last = used.len() - 1;
                    used.swap(slot, last);
                    remaining[v] -= 1;
                }
            }

            let mut next_cache: Vec<u32> = corners.to_vec();
            next_cache.extend(cache.iter().filter(|v| !corners.contains(*v)));
            for &evicted in next_cache.iter().skip(self.cache_size) {
                cache_position[evicted as usize] = None;
            }
            next_cache.truncate(self.cache_size + 3);
            cache = next_cache;

            for (position, &v) in cache.iter().enumerate() {
                let v = v as usize;
                cache_position[v] = (position < self.cache_size).then_some(position);
                vertex_scores[v] = self.vertex_score(cache_position[v], remaining[v]);
            }

            best = None;
            let mut best_score = f32::NEG_INFINITY;
            for &v in &cache {
                let v = v as usize;
                for &t in &adjacency[offsets[v]..offsets[v] + remaining[v] as usize] {
                    let score: f32 = indices[t * 3..t * 3 + 3]
                        .iter()
                        .map(|&c| vertex_scores[c as usize])
                        .sum();
                    triangle_scores[t] = score;
                    if score > best_score {
                        best_score = score;
                        best = Some(t);
                    }
                }
            }

            if best.is_none() {
                while cursor < triangle_count && added[cursor] {
                    cursor += 1;
                }
                best = (cursor < triangle_count).then_some(cursor);
            }
        }

        order
    }
}

impl VertexCacheOptimizer for ForsythOptimizer {
    fn optimize(&self, vertices: &mut [RawVertex], indices: &mut [u32]) {
        if indices.len() % 3 != 0 {
            warn!("index count {} is not a multiple of 3, skipping vertex cache optimization", indices.len());
            return;
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            warn!("index {} is outside of {} vertices, skipping vertex cache optimization", bad, vertices.len());
            return;
        }

        let order = self.triangle_order(vertices.len(), indices);
        let reordered: Vec<u32> = order
            .iter()
            .flat_map(|&t| indices[t * 3..t * 3 + 3].iter().copied())
            .collect();

        // renumber vertices by first use; unreferenced ones keep their relative order at the end
        let mut remap: Vec<Option<u32>> = vec![None; vertices.len()];
        let mut new_order: Vec<usize> = Vec::with_capacity(vertices.len());
        for &v in &reordered {
            if remap[v as usize].is_none() {
                remap[v as usize] = Some(new_order.len() as u32);
                new_order.push(v as usize);
            }
        }
        for v in 0..vertices.len() {
            if remap[v].is_none() {
                remap[v] = Some(new_order.len() as u32);
                new_order.push(v);
            }
        }

        let permuted: Vec<RawVertex> = new_order.iter().map(|&v| vertices[v]).collect();
        vertices.copy_from_slice(&permuted);
        for (dst, src) in indices.iter_mut().zip(reordered.iter()) {
            *dst = remap[*src as usize].unwrap_or(*src);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use glam::Vec3;

    use super::*;

    fn grid(n: usize) -> (Vec<RawVertex>, Vec<u32>) {
        let mut vertices = vec![];
        for y in 0..=n {
            for x in 0..=n {
                vertices.push(RawVertex {
                    position: Vec3::new(x as f32, y as f32, 0.0),
                    ..Default::default()
                });
            }
        }
        let mut indices = vec![];
        let row = (n + 1) as u32;
        for y in 0..n as u32 {
            for x in 0..n as u32 {
                let a = y * row + x;
                indices.extend_from_slice(&[a, a + 1, a + row, a + 1, a + row + 1, a + row]);
            }
        }
        (vertices, indices)
    }

    fn triangle_set(vertices: &[RawVertex], indices: &[u32]) -> HashSet<[[u32; 3]; 3]> {
        indices
            .chunks_exact(3)
            .map(|t| {
                let mut corners: Vec<[u32; 3]> = t
                    .iter()
                    .map(|&i| vertices[i as usize].position.to_array().map(f32::to_bits))
                    .collect();
                // rotation of a triangle keeps its winding; normalize to the smallest corner first
                let start = (0..3).min_by_key(|&i| corners[i]).unwrap();
                corners.rotate_left(start);
                [corners[0], corners[1], corners[2]]
            })
            .collect()
    }

    #[test]
    fn optimized_mesh_is_equivalent() {
        let (mut vertices, mut indices) = grid(12);
        let before = triangle_set(&vertices, &indices);
        let vertex_count = vertices.len();
        ForsythOptimizer::default().optimize(&mut vertices, &mut indices);
        assert_eq!(vertices.len(), vertex_count);
        assert_eq!(triangle_set(&vertices, &indices), before);
    }

    #[test]
    fn vertices_are_renumbered_in_first_use_order() {
        let (mut vertices, mut indices) = grid(4);
        ForsythOptimizer::default().optimize(&mut vertices, &mut indices);
        let mut next = 0;
        for &i in &indices {
            assert!(i <= next);
            if i == next {
                next += 1;
            }
        }
    }

    #[test]
    fn scrambled_triangles_get_fewer_cache_misses() {
        let (mut vertices, indices) = grid(24);
        let triangle_count = indices.len() / 3;
        // 577 is coprime with the triangle count, so this visits every triangle once
        let mut scrambled: Vec<u32> = (0..triangle_count)
            .flat_map(|t| {
                let s = (t * 577) % triangle_count;
                indices[s * 3..s * 3 + 3].to_vec()
            })
            .collect();
        let before = VertexCacheStats::measure(&scrambled, 16);
        ForsythOptimizer::default().optimize(&mut vertices, &mut scrambled);
        let after = VertexCacheStats::measure(&scrambled, 16);
        assert!(after.acmr < before.acmr, "{:?} vs {:?}", after, before);
        assert!(after.atvr < before.atvr);
    }

    #[test]
    fn cache_stats_of_small_lists() {
        assert_eq!(VertexCacheStats::measure(&[], 16).acmr, 0.0);
        // a fan around vertex 0 misses once per new rim vertex
        let fan = [0, 1, 2, 0, 2, 3, 0, 3, 4];
        let stats = VertexCacheStats::measure(&fan, 16);
        assert_eq!(stats.acmr, 5.0 / 3.0);
        assert_eq!(stats.atvr, 1.0);
        // a two entry cache keeps losing the hub
        let stats = VertexCacheStats::measure(&fan, 2);
        assert!(stats.atvr > 1.0);
    }

    #[test]
    fn unreferenced_vertices_are_kept() {
        let mut vertices = vec![RawVertex::default(); 4];
        vertices[3].position = Vec3::X;
        let mut indices = vec![2, 1, 0];
        ForsythOptimizer::default().optimize(&mut vertices, &mut indices);
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(vertices[3].position, Vec3::X);
    }

    #[test]
    fn out_of_range_indices_are_left_alone() {
        let mut vertices = vec![RawVertex::default(); 2];
        let mut indices = vec![0, 1, 5];
        ForsythOptimizer::default().optimize(&mut vertices, &mut indices);
        assert_eq!(indices, vec![0, 1, 5]);
    }
}

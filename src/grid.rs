use glam::DVec2;

/// Uniform grid over 2D cells for neighbor candidate queries.
///
/// Counting-sort construction: count particles per cell, prefix sum,
/// scatter. Cells are hashed into a fixed table, so a query may return a
/// candidate twice when distinct cells collide; callers that need the exact
/// pair set deduplicate.
///
/// This is a drop-in replacement for the O(N^2) pair scan and must not
/// change the set of generated contacts.
pub struct UniformGrid {
    cell_size: f64,
    inv_cell_size: f64,
    table_size: usize,
    /// cell_count[hash] = number of particles in the cell (reused for
    /// scatter offsets during build).
    cell_count: Vec<u32>,
    /// cell_start[hash] = first index of the cell's particles in
    /// `sorted_indices`.
    cell_start: Vec<u32>,
    /// Particle indices sorted by cell hash.
    sorted_indices: Vec<u32>,
    /// Cell hash per particle, kept between build phases.
    particle_hashes: Vec<u32>,
}

impl UniformGrid {
    /// `cell_size` must be at least the interaction radius
    /// (`PARTICLE_DIAM` for contacts).
    pub fn new(cell_size: f64, table_size: usize) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            table_size,
            cell_count: vec![0; table_size],
            cell_start: vec![0; table_size],
            sorted_indices: Vec::new(),
            particle_hashes: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Rebuild the grid from the given positions. O(N).
    pub fn build(&mut self, positions: &[DVec2]) {
        let n = positions.len();
        self.sorted_indices.resize(n, 0);
        self.particle_hashes.resize(n, 0);

        for v in self.cell_count.iter_mut() {
            *v = 0;
        }

        for (i, pos) in positions.iter().enumerate() {
            let (cx, cy) = self.cell_coords(*pos);
            let h = self.hash_cell(cx, cy);
            self.particle_hashes[i] = h as u32;
            self.cell_count[h] += 1;
        }

        self.cell_start[0] = 0;
        for k in 1..self.table_size {
            self.cell_start[k] = self.cell_start[k - 1] + self.cell_count[k - 1];
        }

        for v in self.cell_count.iter_mut() {
            *v = 0;
        }

        for i in 0..n {
            let h = self.particle_hashes[i] as usize;
            let idx = self.cell_start[h] + self.cell_count[h];
            self.sorted_indices[idx as usize] = i as u32;
            self.cell_count[h] += 1;
        }
    }

    /// Visit every particle stored in the position's cell and its eight
    /// neighbors. The caller is responsible for distance checks and for
    /// deduplicating hash collisions.
    pub fn query_neighbors<F: FnMut(u32)>(&self, pos: DVec2, mut callback: F) {
        let (cx, cy) = self.cell_coords(pos);
        for dx in -1..=1_i32 {
            for dy in -1..=1_i32 {
                let h = self.hash_cell(cx + dx, cy + dy);
                let start = self.cell_start[h] as usize;
                let end = start + self.cell_count[h] as usize;
                for idx in start..end {
                    callback(self.sorted_indices[idx]);
                }
            }
        }
    }

    #[inline]
    fn hash_cell(&self, cx: i32, cy: i32) -> usize {
        let h = (cx as u32).wrapping_mul(73856093) ^ (cy as u32).wrapping_mul(19349663);
        (h as usize) % self.table_size
    }

    #[inline]
    fn cell_coords(&self, pos: DVec2) -> (i32, i32) {
        (
            (pos.x * self.inv_cell_size).floor() as i32,
            (pos.y * self.inv_cell_size).floor() as i32,
        )
    }
}

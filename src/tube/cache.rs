use std::collections::HashMap;
use crate::calc::canonical_bits;
use super::grid::{Grid, GridValues};

/// Content key of a grid query: the grid shape, the bits of every coordinate of every
/// axis, and the query parameters. Two queries share an entry only if all of these are
/// identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridKey {

    shape : Vec<usize>,

    coords : Vec<u64>,

    width : Option<u64>,

    nsamples : Option<usize>

}

impl GridKey {

    pub fn new(grid : &Grid, width : Option<f64>, nsamples : Option<usize>) -> Self {
        let coords = grid.axes().iter()
            .flat_map(|a| a.iter().map(|v| canonical_bits(*v) ) )
            .collect();
        Self { shape : grid.shape().to_vec(), coords, width : width.map(canonical_bits), nsamples }
    }

}

/// Memoized results of the grid queries of a tube. Entries are only dropped by clear.
#[derive(Debug, Default)]
pub struct QueryCache {

    inside : HashMap<GridKey, GridValues<bool>>,

    log_density : HashMap<GridKey, GridValues<f64>>

}

impl QueryCache {

    pub fn inside(&self, key : &GridKey) -> Option<&GridValues<bool>> {
        self.inside.get(key)
    }

    pub fn log_density(&self, key : &GridKey) -> Option<&GridValues<f64>> {
        self.log_density.get(key)
    }

    pub fn insert_inside(&mut self, key : GridKey, vals : GridValues<bool>) {
        self.inside.insert(key, vals);
    }

    pub fn insert_log_density(&mut self, key : GridKey, vals : GridValues<f64>) {
        self.log_density.insert(key, vals);
    }

    pub fn len(&self) -> usize {
        self.inside.len() + self.log_density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.inside.clear();
        self.log_density.clear();
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn keys_depend_on_content() {
        let a = Grid::mgrid(&[(0.0, 1.0, 3), (0.0, 1.0, 3)]);
        let b = Grid::mgrid(&[(0.0, 1.0, 3), (0.0, 1.0, 3)]);
        let c = Grid::mgrid(&[(0.0, 1.1, 3), (0.0, 1.0, 3)]);
        assert_eq!(GridKey::new(&a, Some(1.0), Some(12)), GridKey::new(&b, Some(1.0), Some(12)));
        assert_ne!(GridKey::new(&a, None, None), GridKey::new(&c, None, None));
        assert_ne!(GridKey::new(&a, Some(1.0), Some(12)), GridKey::new(&a, Some(2.0), Some(12)));

        // Same coordinates, different shapes.
        let flat = Grid::from_axes(vec![(vec![1, 2], vec![0.0, 1.0])]).unwrap();
        let col = Grid::from_axes(vec![(vec![2, 1], vec![0.0, 1.0])]).unwrap();
        assert_ne!(GridKey::new(&flat, None, None), GridKey::new(&col, None, None));
    }

    #[test]
    fn clear_empties_both_maps() {
        let g = Grid::mgrid(&[(0.0, 1.0, 2), (0.0, 1.0, 2)]);
        let mut cache = QueryCache::default();
        let vals = GridValues { shape : vec![2, 2], values : vec![0.0; 4] };
        cache.insert_log_density(GridKey::new(&g, None, None), vals.clone());
        cache.insert_inside(GridKey::new(&g, Some(1.0), Some(12)), GridValues { shape : vec![2, 2], values : vec![true; 4] });
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.log_density(&GridKey::new(&g, None, None)), Some(&vals));
        cache.clear();
        assert!(cache.is_empty());
    }

}

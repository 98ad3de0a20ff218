// crates/lh_physics/tests/decomposition.rs

//! 网格分解集成测试
//!
//! 所有 tile 的拥有区间必须恰好覆盖全局网格一次，邻居关系两两对称。

use lh_physics::mesh::{split_counts, ChunkNeighbour, Decomposition, TileNeighbour};
use lh_physics::Face;

fn coverage(x_cells: usize, y_cells: usize, ranks: usize, tiles: usize) -> Vec<u32> {
    let d = Decomposition::new(x_cells, y_cells, ranks, tiles).expect("分解失败");
    let mut owned = vec![0u32; x_cells * y_cells];
    for rank in 0..d.num_chunks() {
        for tile in d.tiles(rank).unwrap() {
            for gx in tile.t_left..=tile.t_right {
                for gy in tile.t_bottom..=tile.t_top {
                    owned[(gx - 1) * y_cells + (gy - 1)] += 1;
                }
            }
        }
    }
    owned
}

#[test]
fn test_every_cell_owned_exactly_once() {
    let cases = [
        (16, 16, 1, 1),
        (16, 16, 2, 4),
        (16, 16, 4, 4),
        (32, 8, 8, 2),
        (12, 18, 6, 3),
        (10, 40, 4, 2),
    ];
    for (x, y, ranks, tiles) in cases {
        let owned = coverage(x, y, ranks, tiles);
        assert!(owned.iter().all(|&n| n == 1), "{}×{} ranks={} tiles={}", x, y, ranks, tiles);
        assert!(Decomposition::new(x, y, ranks, tiles).unwrap().covers_exactly());
    }
}

#[test]
fn test_four_by_four_with_four_tiles() {
    let d = Decomposition::new(4, 4, 1, 4).unwrap();
    let tiles = d.tiles(0).unwrap();
    assert_eq!(tiles.len(), 4);

    let extents: Vec<_> = tiles.iter().map(|t| (t.t_left, t.t_right, t.t_bottom, t.t_top)).collect();
    assert_eq!(extents, vec![(1, 2, 1, 2), (3, 4, 1, 2), (1, 2, 3, 4), (3, 4, 3, 4)]);
    for t in &tiles {
        assert_eq!((t.t_xmin, t.t_xmax, t.t_ymin, t.t_ymax), (1, 2, 1, 2));
    }
}

#[test]
fn test_chunk_neighbours_are_symmetric() {
    let d = Decomposition::new(24, 24, 9, 1).unwrap();
    for chunk in d.chunks() {
        for face in Face::ALL {
            if let ChunkNeighbour::Rank(peer) = chunk.neighbour(face) {
                let other = d.chunk(peer).unwrap();
                assert_eq!(other.neighbour(face.opposite()), ChunkNeighbour::Rank(chunk.task));
            }
        }
    }
    // 中心 chunk 四面都有邻居
    assert!(Face::ALL.iter().all(|&f| d.chunk(4).unwrap().neighbour(f) != ChunkNeighbour::External));
}

#[test]
fn test_tile_neighbours_cross_chunks() {
    let d = Decomposition::new(16, 16, 4, 4).unwrap();
    // rank 0 位于左下角，其右上 tile 的右邻是 rank 1，上邻是 rank 2
    let tiles = d.tiles(0).unwrap();
    let top_right = tiles.last().unwrap();
    assert_eq!(top_right.neighbour(Face::Right), TileNeighbour::Chunk(1));
    assert_eq!(top_right.neighbour(Face::Top), TileNeighbour::Chunk(2));
    assert_eq!(top_right.neighbour(Face::Left), TileNeighbour::Tile(2));
    assert_eq!(top_right.neighbour(Face::Bottom), TileNeighbour::Tile(1));
    assert!(top_right.on_chunk_edge(Face::Right));
    assert!(!top_right.on_chunk_edge(Face::Left));
}

#[test]
fn test_split_prefers_mesh_aspect() {
    assert_eq!(split_counts(4, 16, 16), (2, 2));
    assert_eq!(split_counts(2, 16, 16), (2, 1));
    assert_eq!(split_counts(8, 32, 8), (4, 2));
    assert_eq!(split_counts(3, 4, 12), (1, 3));
}

#[test]
fn test_uneven_division_rejected() {
    assert!(Decomposition::new(10, 10, 3, 1).is_err());
    assert!(Decomposition::new(8, 8, 1, 3).is_err());
    assert!(Decomposition::new(0, 8, 1, 1).is_err());
}

#[test]
fn test_edge_mask_independent_of_chunk_neighbour() {
    // rank 0 左侧为外部边界，右侧为 rank 1；两侧外缘 tile 的掩码位都置位
    let d = Decomposition::new(16, 8, 2, 4).unwrap();
    let chunk = d.chunk(0).unwrap();
    assert_eq!(chunk.neighbour(Face::Left), ChunkNeighbour::External);
    assert_eq!(chunk.neighbour(Face::Right), ChunkNeighbour::Rank(1));

    let tiles = d.tiles(0).unwrap();
    assert_eq!(tiles[0].external_tile_mask, [true, false, true, false]);
    assert_eq!(tiles[1].external_tile_mask, [false, true, true, false]);
    assert_eq!(tiles[1].neighbour(Face::Right), TileNeighbour::Chunk(1));
    assert_eq!(tiles[0].neighbour(Face::Left), TileNeighbour::External);

    // 单 rank 时四面都是外部，掩码仍只标记外缘
    let single = Decomposition::new(16, 16, 1, 4).unwrap();
    let tiles = single.tiles(0).unwrap();
    assert_eq!(tiles[0].external_tile_mask, [true, false, true, false]);
    assert_eq!(tiles[3].external_tile_mask, [false, true, false, true]);
}

// crates/lh_physics/src/dump.rs

//! 调试快照
//!
//! 以文本形式写出标量运行状态、每个 tile 的拓扑信息，可选写出全部数组内容。
//! 仅用于调试，格式不保证兼容。
//!
//! ```text
//! Dump(tileCount = 4)
//! error_condition=0
//! step=0
//! ...
//!     Tile[ 0]:
//! info.tile_neighbours[left]=External
//! info.external_tile_mask[left]=true
//! ...
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use lh_runtime::{Buffer1D, Buffer2D};
use tracing::info;

use crate::error::{HydroError, HydroResult};
use crate::fields::{FieldId, FieldSet};
use crate::mesh::{Face, Tile};
use crate::state::SimulationState;

/// 快照选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// 写出数组内容
    pub fields: bool,
}

/// 将模拟状态写入文本文件
pub fn dump(state: &SimulationState, path: impl AsRef<Path>, options: DumpOptions) -> HydroResult<()> {
    let path = path.as_ref();
    info!(path = %path.display(), fields = options.fields, "写出调试快照");

    let io_error = |source| HydroError::Io { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(io_error)?;
    let mut out = BufWriter::new(file);
    write_dump(&mut out, state, options).map_err(io_error)?;
    out.flush().map_err(io_error)
}

/// 将模拟状态写入任意输出流
pub fn write_dump<W: Write>(out: &mut W, state: &SimulationState, options: DumpOptions) -> io::Result<()> {
    let run = &state.run;
    writeln!(out, "Dump(tileCount = {})", state.chunk.tiles.len())?;
    writeln!(out, "error_condition={}", run.error_condition)?;
    writeln!(out, "step={}", run.step)?;
    writeln!(out, "advect_x={}", run.advect_x)?;
    writeln!(out, "time={}", run.time)?;
    writeln!(out, "dt={}", run.dt)?;
    writeln!(out, "dtold={}", run.dtold)?;
    writeln!(out, "complete={}", run.complete)?;
    writeln!(out, "jdt={}", run.jdt)?;
    writeln!(out, "kdt={}", run.kdt)?;

    for tile in &state.chunk.tiles {
        write_tile(out, tile, options)?;
    }
    Ok(())
}

fn write_tile<W: Write>(out: &mut W, tile: &Tile, options: DumpOptions) -> io::Result<()> {
    let info = &tile.info;
    writeln!(out, "\tTile[ {}]:", info.index)?;
    for face in Face::ALL {
        writeln!(out, "info.tile_neighbours[{}]={:?}", face, info.neighbour(face))?;
        writeln!(out, "info.external_tile_mask[{}]={}", face, info.on_chunk_edge(face))?;
    }
    writeln!(out, "info.t_xmin={}", info.t_xmin)?;
    writeln!(out, "info.t_xmax={}", info.t_xmax)?;
    writeln!(out, "info.t_ymin={}", info.t_ymin)?;
    writeln!(out, "info.t_ymax={}", info.t_ymax)?;
    writeln!(out, "info.t_left={}", info.t_left)?;
    writeln!(out, "info.t_right={}", info.t_right)?;
    writeln!(out, "info.t_bottom={}", info.t_bottom)?;
    writeln!(out, "info.t_top={}", info.t_top)?;

    if options.fields {
        write_fields(out, &tile.field)?;
    }
    Ok(())
}

fn write_fields<W: Write>(out: &mut W, field: &FieldSet) -> io::Result<()> {
    for id in FieldId::ALL {
        show2(out, id.name(), field.get(id))?;
    }
    for n in 1..=7 {
        if let Some(work) = field.work_array(n) {
            show2(out, &format!("work_array{}", n), work)?;
        }
    }

    show1(out, "cellx", &field.cellx)?;
    show1(out, "celldx", &field.celldx)?;
    show1(out, "celly", &field.celly)?;
    show1(out, "celldy", &field.celldy)?;
    show1(out, "vertexx", &field.vertexx)?;
    show1(out, "vertexdx", &field.vertexdx)?;
    show1(out, "vertexy", &field.vertexy)?;
    show1(out, "vertexdy", &field.vertexdy)?;

    show2(out, "volume", &field.volume)?;
    show2(out, "xarea", &field.xarea)?;
    show2(out, "yarea", &field.yarea)
}

fn show1<W: Write>(out: &mut W, name: &str, buffer: &Buffer1D<f64>) -> io::Result<()> {
    writeln!(out, "{}(1) [{}]", name, buffer.len())?;
    write!(out, "\t")?;
    for v in buffer.mirrored() {
        write!(out, "{}, ", v)?;
    }
    writeln!(out)
}

fn show2<W: Write>(out: &mut W, name: &str, buffer: &Buffer2D<f64>) -> io::Result<()> {
    writeln!(out, "{}(2) [{}x{}]", name, buffer.size_x(), buffer.size_y())?;
    let host = buffer.mirrored();
    for row in host.chunks(buffer.size_y()) {
        write!(out, "\t")?;
        for v in row {
            write!(out, "{}, ", v)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lh_config::{GridConfig, RunConfig};
    use lh_runtime::{Context, ContextConfig};

    fn state(tiles: usize) -> SimulationState {
        let ctx = Context::new(ContextConfig::default().with_threads(1)).unwrap();
        let config = RunConfig {
            grid: GridConfig { x_cells: 4, y_cells: 4, ..Default::default() },
            tiles_per_chunk: tiles,
            ..Default::default()
        };
        SimulationState::build(config, ctx, 0, 1).unwrap()
    }

    #[test]
    fn test_header_and_scalars() {
        let mut buf = Vec::new();
        write_dump(&mut buf, &state(4), DumpOptions::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Dump(tileCount = 4)"));
        assert_eq!(lines.next(), Some("error_condition=0"));
        assert!(text.contains("advect_x=true"));
        assert_eq!(text.matches("\tTile[").count(), 4);
        assert!(!text.contains("density0(2)"));
    }

    #[test]
    fn test_each_face_reported() {
        let mut buf = Vec::new();
        write_dump(&mut buf, &state(4), DumpOptions::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        // tile 0 位于左下角：左、下为外部边界，右邻 tile 1，上邻 tile 2
        assert!(text.contains("info.tile_neighbours[left]=External"));
        assert!(text.contains("info.tile_neighbours[right]=Tile(1)"));
        assert!(text.contains("info.tile_neighbours[top]=Tile(2)"));
        assert!(text.contains("info.external_tile_mask[bottom]=true"));
    }

    #[test]
    fn test_field_listing() {
        let mut buf = Vec::new();
        write_dump(&mut buf, &state(1), DumpOptions { fields: true }).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("density0(2) [8x8]"));
        assert!(text.contains("xvel0(2) [9x9]"));
        assert!(text.contains("work_array7(2) [9x9]"));
        assert!(text.contains("vertexx(1) [9]"));
        assert!(text.contains("xarea(2) [9x8]"));
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("dump.txt");
        let err = dump(&state(1), &missing, DumpOptions::default()).unwrap_err();
        assert_eq!(err.stage(), "io");
    }
}

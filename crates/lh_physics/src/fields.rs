// crates/lh_physics/src/fields.rs

//! 场注册表与 tile 场集合
//!
//! # 交错网格
//!
//! 场按所在位置分为四类，`x_inc`/`y_inc` 表示该位置在对应方向上
//! 比单元中心多出的一个点：
//!
//! | 类别 | x_inc | y_inc | 数组尺寸 |
//! |------|-------|-------|----------|
//! | Cell | 0 | 0 | (nx+4) × (ny+4) |
//! | Vertex | 1 | 1 | (nx+5) × (ny+5) |
//! | XFace | 1 | 0 | (nx+5) × (ny+4) |
//! | YFace | 0 | 1 | (nx+4) × (ny+5) |
//!
//! 每个数组两侧各有两层 ghost，内部单元的数组索引从 2 开始。

use std::fmt;

use lh_runtime::{Buffer1D, Buffer2D, Context, RuntimeResult};

/// ghost 层数（数组偏移）
pub const GHOST_LAYERS: usize = 2;

/// 可交换场数量
pub const NUM_FIELDS: usize = 15;

/// 场位置类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// 单元中心
    Cell,
    /// 顶点
    Vertex,
    /// X 法向面
    XFace,
    /// Y 法向面
    YFace,
}

impl FieldKind {
    /// X 方向增量
    #[inline]
    pub fn x_inc(self) -> usize {
        match self {
            Self::Cell | Self::YFace => 0,
            Self::Vertex | Self::XFace => 1,
        }
    }

    /// Y 方向增量
    #[inline]
    pub fn y_inc(self) -> usize {
        match self {
            Self::Cell | Self::XFace => 0,
            Self::Vertex | Self::YFace => 1,
        }
    }

    /// 给定内部单元数时的数组尺寸
    #[inline]
    pub fn dims(self, x_cells: usize, y_cells: usize) -> (usize, usize) {
        (
            x_cells + 2 * GHOST_LAYERS + self.x_inc(),
            y_cells + 2 * GHOST_LAYERS + self.y_inc(),
        )
    }
}

/// 可交换场标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    /// 密度（时间层 0）
    Density0,
    /// 密度（时间层 1）
    Density1,
    /// 比内能（时间层 0）
    Energy0,
    /// 比内能（时间层 1）
    Energy1,
    /// 压力
    Pressure,
    /// 人工粘性
    Viscosity,
    /// 声速
    Soundspeed,
    /// X 速度（时间层 0）
    XVel0,
    /// X 速度（时间层 1）
    XVel1,
    /// Y 速度（时间层 0）
    YVel0,
    /// Y 速度（时间层 1）
    YVel1,
    /// X 方向体积通量
    VolFluxX,
    /// Y 方向体积通量
    VolFluxY,
    /// X 方向质量通量
    MassFluxX,
    /// Y 方向质量通量
    MassFluxY,
}

impl FieldId {
    /// 全部场，按交换偏移的累加次序
    pub const ALL: [FieldId; NUM_FIELDS] = [
        Self::Density0,
        Self::Density1,
        Self::Energy0,
        Self::Energy1,
        Self::Pressure,
        Self::Viscosity,
        Self::Soundspeed,
        Self::XVel0,
        Self::XVel1,
        Self::YVel0,
        Self::YVel1,
        Self::VolFluxX,
        Self::VolFluxY,
        Self::MassFluxX,
        Self::MassFluxY,
    ];

    /// 注册表下标
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// 位置类别
    pub fn kind(self) -> FieldKind {
        match self {
            Self::Density0
            | Self::Density1
            | Self::Energy0
            | Self::Energy1
            | Self::Pressure
            | Self::Viscosity
            | Self::Soundspeed => FieldKind::Cell,
            Self::XVel0 | Self::XVel1 | Self::YVel0 | Self::YVel1 => FieldKind::Vertex,
            Self::VolFluxX | Self::MassFluxX => FieldKind::XFace,
            Self::VolFluxY | Self::MassFluxY => FieldKind::YFace,
        }
    }

    /// 场名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Density0 => "density0",
            Self::Density1 => "density1",
            Self::Energy0 => "energy0",
            Self::Energy1 => "energy1",
            Self::Pressure => "pressure",
            Self::Viscosity => "viscosity",
            Self::Soundspeed => "soundspeed",
            Self::XVel0 => "xvel0",
            Self::XVel1 => "xvel1",
            Self::YVel0 => "yvel0",
            Self::YVel1 => "yvel1",
            Self::VolFluxX => "vol_flux_x",
            Self::VolFluxY => "vol_flux_y",
            Self::MassFluxX => "mass_flux_x",
            Self::MassFluxY => "mass_flux_y",
        }
    }

    /// 按名称查找
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================
// 场选择
// ============================================================

/// 一次交换所选的场集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSelection([bool; NUM_FIELDS]);

impl FieldSelection {
    /// 空选择
    pub fn none() -> Self {
        Self([false; NUM_FIELDS])
    }

    /// 全选
    pub fn all() -> Self {
        Self([true; NUM_FIELDS])
    }

    /// 由给定场构造
    pub fn of(ids: &[FieldId]) -> Self {
        ids.iter().fold(Self::none(), |sel, &id| sel.with(id))
    }

    /// 由逐场标志构造
    pub fn from_flags(flags: [bool; NUM_FIELDS]) -> Self {
        Self(flags)
    }

    /// 加入一个场
    pub fn with(mut self, id: FieldId) -> Self {
        self.0[id.index()] = true;
        self
    }

    /// 设置选择状态
    pub fn set(&mut self, id: FieldId, selected: bool) {
        self.0[id.index()] = selected;
    }

    /// 是否选中
    #[inline]
    pub fn contains(&self, id: FieldId) -> bool {
        self.0[id.index()]
    }

    /// 按注册表次序迭代选中的场
    pub fn iter(&self) -> impl Iterator<Item = FieldId> + '_ {
        FieldId::ALL.into_iter().filter(|id| self.contains(*id))
    }

    /// 选中数量
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&s| s).count()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl fmt::Display for FieldSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(FieldId::name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// ============================================================
// 场集合
// ============================================================

/// 单个 tile 的全部设备数组
pub struct FieldSet {
    /// X 方向内部单元数
    pub x_cells: usize,
    /// Y 方向内部单元数
    pub y_cells: usize,

    /// 密度 0
    pub density0: Buffer2D<f64>,
    /// 密度 1
    pub density1: Buffer2D<f64>,
    /// 内能 0
    pub energy0: Buffer2D<f64>,
    /// 内能 1
    pub energy1: Buffer2D<f64>,
    /// 压力
    pub pressure: Buffer2D<f64>,
    /// 人工粘性
    pub viscosity: Buffer2D<f64>,
    /// 声速
    pub soundspeed: Buffer2D<f64>,
    /// X 速度 0
    pub xvel0: Buffer2D<f64>,
    /// X 速度 1
    pub xvel1: Buffer2D<f64>,
    /// Y 速度 0
    pub yvel0: Buffer2D<f64>,
    /// Y 速度 1
    pub yvel1: Buffer2D<f64>,
    /// X 体积通量
    pub vol_flux_x: Buffer2D<f64>,
    /// Y 体积通量
    pub vol_flux_y: Buffer2D<f64>,
    /// X 质量通量
    pub mass_flux_x: Buffer2D<f64>,
    /// Y 质量通量
    pub mass_flux_y: Buffer2D<f64>,

    /// 工作数组 1
    pub work_array1: Buffer2D<f64>,
    /// 工作数组 2
    pub work_array2: Buffer2D<f64>,
    /// 工作数组 3
    pub work_array3: Buffer2D<f64>,
    /// 工作数组 4
    pub work_array4: Buffer2D<f64>,
    /// 工作数组 5
    pub work_array5: Buffer2D<f64>,
    /// 工作数组 6
    pub work_array6: Buffer2D<f64>,
    /// 工作数组 7
    pub work_array7: Buffer2D<f64>,

    /// 单元中心 X 坐标
    pub cellx: Buffer1D<f64>,
    /// 单元中心 Y 坐标
    pub celly: Buffer1D<f64>,
    /// 顶点 X 坐标
    pub vertexx: Buffer1D<f64>,
    /// 顶点 Y 坐标
    pub vertexy: Buffer1D<f64>,
    /// 单元 X 宽度
    pub celldx: Buffer1D<f64>,
    /// 单元 Y 宽度
    pub celldy: Buffer1D<f64>,
    /// 顶点 X 间距
    pub vertexdx: Buffer1D<f64>,
    /// 顶点 Y 间距
    pub vertexdy: Buffer1D<f64>,
    /// 单元体积
    pub volume: Buffer2D<f64>,
    /// X 面面积
    pub xarea: Buffer2D<f64>,
    /// Y 面面积
    pub yarea: Buffer2D<f64>,
}

impl FieldSet {
    /// 为 `x_cells × y_cells` 个内部单元分配全部数组
    pub fn allocate(context: &Context, x_cells: usize, y_cells: usize) -> RuntimeResult<Self> {
        let field = |kind: FieldKind| {
            let (nx, ny) = kind.dims(x_cells, y_cells);
            Buffer2D::new(context, nx, ny)
        };
        let (vx, vy) = FieldKind::Vertex.dims(x_cells, y_cells);
        let (cx, cy) = FieldKind::Cell.dims(x_cells, y_cells);

        Ok(Self {
            x_cells,
            y_cells,
            density0: field(FieldKind::Cell)?,
            density1: field(FieldKind::Cell)?,
            energy0: field(FieldKind::Cell)?,
            energy1: field(FieldKind::Cell)?,
            pressure: field(FieldKind::Cell)?,
            viscosity: field(FieldKind::Cell)?,
            soundspeed: field(FieldKind::Cell)?,
            xvel0: field(FieldKind::Vertex)?,
            xvel1: field(FieldKind::Vertex)?,
            yvel0: field(FieldKind::Vertex)?,
            yvel1: field(FieldKind::Vertex)?,
            vol_flux_x: field(FieldKind::XFace)?,
            vol_flux_y: field(FieldKind::YFace)?,
            mass_flux_x: field(FieldKind::XFace)?,
            mass_flux_y: field(FieldKind::YFace)?,
            work_array1: field(FieldKind::Vertex)?,
            work_array2: field(FieldKind::Vertex)?,
            work_array3: field(FieldKind::Vertex)?,
            work_array4: field(FieldKind::Vertex)?,
            work_array5: field(FieldKind::Vertex)?,
            work_array6: field(FieldKind::Vertex)?,
            work_array7: field(FieldKind::Vertex)?,
            cellx: Buffer1D::new(context, cx)?,
            celly: Buffer1D::new(context, cy)?,
            vertexx: Buffer1D::new(context, vx)?,
            vertexy: Buffer1D::new(context, vy)?,
            celldx: Buffer1D::new(context, cx)?,
            celldy: Buffer1D::new(context, cy)?,
            vertexdx: Buffer1D::new(context, vx)?,
            vertexdy: Buffer1D::new(context, vy)?,
            volume: field(FieldKind::Cell)?,
            xarea: field(FieldKind::XFace)?,
            yarea: field(FieldKind::YFace)?,
        })
    }

    /// 按标识取可交换场
    pub fn get(&self, id: FieldId) -> &Buffer2D<f64> {
        match id {
            FieldId::Density0 => &self.density0,
            FieldId::Density1 => &self.density1,
            FieldId::Energy0 => &self.energy0,
            FieldId::Energy1 => &self.energy1,
            FieldId::Pressure => &self.pressure,
            FieldId::Viscosity => &self.viscosity,
            FieldId::Soundspeed => &self.soundspeed,
            FieldId::XVel0 => &self.xvel0,
            FieldId::XVel1 => &self.xvel1,
            FieldId::YVel0 => &self.yvel0,
            FieldId::YVel1 => &self.yvel1,
            FieldId::VolFluxX => &self.vol_flux_x,
            FieldId::VolFluxY => &self.vol_flux_y,
            FieldId::MassFluxX => &self.mass_flux_x,
            FieldId::MassFluxY => &self.mass_flux_y,
        }
    }

    /// 工作数组（1..=7）
    pub fn work_array(&self, n: usize) -> Option<&Buffer2D<f64>> {
        match n {
            1 => Some(&self.work_array1),
            2 => Some(&self.work_array2),
            3 => Some(&self.work_array3),
            4 => Some(&self.work_array4),
            5 => Some(&self.work_array5),
            6 => Some(&self.work_array6),
            7 => Some(&self.work_array7),
            _ => None,
        }
    }
}

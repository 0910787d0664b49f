// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MSM8960 (dual Krait v2) board data.
//!
//! The HFPLL runs off a 27 MHz reference, so an entry's L value is its
//! frequency over 27 MHz, doubled for entries behind the `HFPLL_DIV2`
//! primary input. 384 MHz is not reachable that way and really runs at
//! 378 MHz.

use static_assertions::const_assert;

use crate::config::{Board, VregLimits};
use crate::speed::{
    PRI_SRC_SEL_HFPLL, PRI_SRC_SEL_HFPLL_DIV2, PRI_SRC_SEL_SEC_SRC,
    SEC_SRC_SEL_AUX, SEC_SRC_SEL_QSB,
};
use crate::table::{AcpuLevel, CoreSpeed, L2Level, Src, MAX_LEVELS, STBY_KHZ};

pub const NUM_CPUS: usize = 2;

const fn qsb() -> CoreSpeed {
    CoreSpeed::new(
        STBY_KHZ,
        Src::Qsb,
        PRI_SRC_SEL_SEC_SRC,
        SEC_SRC_SEL_QSB,
        0,
    )
}

const fn pll8() -> CoreSpeed {
    CoreSpeed::new(192_000, Src::Pll8, PRI_SRC_SEL_SEC_SRC, SEC_SRC_SEL_AUX, 0)
}

const fn hfpll(khz: u32, l: u32) -> CoreSpeed {
    CoreSpeed::new(khz, Src::Hfpll, PRI_SRC_SEL_HFPLL, SEC_SRC_SEL_QSB, l)
}

const fn hfpll_div2(khz: u32, l: u32) -> CoreSpeed {
    CoreSpeed::new(khz, Src::Hfpll, PRI_SRC_SEL_HFPLL_DIV2, SEC_SRC_SEL_QSB, l)
}

const fn l2(speed: CoreSpeed, vdd: u32, bw_level: usize) -> L2Level {
    L2Level {
        speed,
        vdd_dig: vdd,
        vdd_mem: vdd,
        bw_level,
    }
}

const fn lvl(
    use_for_scaling: bool,
    speed: CoreSpeed,
    l2_level: usize,
    vdd_core: u32,
) -> AcpuLevel {
    AcpuLevel {
        use_for_scaling,
        speed,
        l2_level,
        vdd_core,
    }
}

pub static L2_LEVELS: [L2Level; 23] = [
    l2(qsb(), 1_050_000, 0),
    l2(pll8(), 1_050_000, 1),
    l2(hfpll_div2(384_000, 0x1C), 1_050_000, 2),
    l2(hfpll_div2(486_000, 0x24), 1_050_000, 2),
    l2(hfpll_div2(540_000, 0x28), 1_050_000, 2),
    l2(hfpll(594_000, 0x16), 1_050_000, 2),
    l2(hfpll(648_000, 0x18), 1_050_000, 4),
    l2(hfpll(702_000, 0x1A), 1_050_000, 4),
    l2(hfpll(756_000, 0x1C), 1_150_000, 4),
    l2(hfpll(810_000, 0x1E), 1_150_000, 4),
    l2(hfpll(864_000, 0x20), 1_150_000, 4),
    l2(hfpll(918_000, 0x22), 1_150_000, 6),
    l2(hfpll(972_000, 0x24), 1_150_000, 6),
    l2(hfpll(1_026_000, 0x26), 1_150_000, 6),
    l2(hfpll(1_080_000, 0x28), 1_150_000, 6),
    l2(hfpll(1_134_000, 0x2A), 1_150_000, 6),
    l2(hfpll(1_188_000, 0x2C), 1_150_000, 6),
    l2(hfpll(1_242_000, 0x2E), 1_150_000, 6),
    l2(hfpll(1_350_000, 0x32), 1_150_000, 6),
    l2(hfpll(1_458_000, 0x36), 1_150_000, 6),
    l2(hfpll(1_512_000, 0x38), 1_150_000, 7),
    l2(hfpll(1_674_000, 0x3E), 1_150_000, 7),
    l2(hfpll(1_728_000, 0x40), 1_150_000, 7),
];

/// The three bins share frequencies and differ in voltage, and in which L2
/// level backs 1.89 GHz.
macro_rules! krait_table {
    (l2_1890: $l2_1890:expr; $($vdd:expr),* $(,)?) => {{
        let v = [$($vdd),*];
        [
            lvl(false, qsb(), 0, v[0]),
            lvl(true, pll8(), 1, v[1]),
            lvl(true, hfpll_div2(384_000, 0x1C), 7, v[2]),
            lvl(true, hfpll_div2(486_000, 0x24), 7, v[3]),
            lvl(false, hfpll_div2(540_000, 0x28), 7, v[4]),
            lvl(true, hfpll(594_000, 0x16), 7, v[5]),
            lvl(false, hfpll(648_000, 0x18), 7, v[6]),
            lvl(true, hfpll(702_000, 0x1A), 7, v[7]),
            lvl(false, hfpll(756_000, 0x1C), 7, v[8]),
            lvl(true, hfpll(810_000, 0x1E), 7, v[9]),
            lvl(false, hfpll(864_000, 0x20), 7, v[10]),
            lvl(true, hfpll(918_000, 0x22), 7, v[11]),
            lvl(false, hfpll(972_000, 0x24), 7, v[12]),
            lvl(true, hfpll(1_026_000, 0x26), 7, v[13]),
            lvl(false, hfpll(1_080_000, 0x28), 16, v[14]),
            lvl(true, hfpll(1_134_000, 0x2A), 16, v[15]),
            lvl(false, hfpll(1_188_000, 0x2C), 16, v[16]),
            lvl(true, hfpll(1_242_000, 0x2E), 16, v[17]),
            lvl(false, hfpll(1_296_000, 0x30), 16, v[18]),
            lvl(true, hfpll(1_350_000, 0x32), 16, v[19]),
            lvl(false, hfpll(1_404_000, 0x34), 16, v[20]),
            lvl(true, hfpll(1_458_000, 0x36), 16, v[21]),
            lvl(true, hfpll(1_512_000, 0x38), 18, v[22]),
            lvl(true, hfpll(1_674_000, 0x3E), 18, v[23]),
            lvl(true, hfpll(1_728_000, 0x40), 19, v[24]),
            lvl(true, hfpll(1_836_000, 0x44), 19, v[25]),
            lvl(true, hfpll(1_890_000, 0x46), $l2_1890, v[26]),
            lvl(true, hfpll(1_998_000, 0x4A), 21, v[27]),
            lvl(true, hfpll(2_160_000, 0x50), 21, v[28]),
        ]
    }};
}

const TABLE_LEN: usize = 29;
const_assert!(TABLE_LEN <= MAX_LEVELS);

pub static SLOW: [AcpuLevel; TABLE_LEN] = krait_table![
    l2_1890: 20;
    850_000, 900_000, 900_000, 950_000, 1_000_000, 1_000_000,
    1_025_000, 1_025_000, 1_075_000, 1_075_000, 1_100_000, 1_100_000,
    1_125_000, 1_125_000, 1_175_000, 1_175_000, 1_200_000, 1_200_000,
    1_225_000, 1_225_000, 1_237_500, 1_237_500, 1_250_000, 1_275_000,
    1_300_000, 1_325_000, 1_350_000, 1_350_000, 1_350_000,
];

pub static NOMINAL: [AcpuLevel; TABLE_LEN] = krait_table![
    l2_1890: 19;
    800_000, 800_000, 850_000, 900_000, 950_000, 950_000, 975_000, 975_000,
    1_025_000, 1_025_000, 1_050_000, 1_050_000, 1_075_000, 1_075_000,
    1_100_000, 1_125_000, 1_125_000, 1_150_000, 1_150_000, 1_175_000,
    1_175_000, 1_187_500, 1_200_000, 1_225_000, 1_250_000, 1_275_000,
    1_300_000, 1_325_000, 1_350_000,
];

pub static FAST: [AcpuLevel; TABLE_LEN] = krait_table![
    l2_1890: 19;
    800_000, 800_000, 800_000, 850_000, 900_000, 900_000, 925_000, 925_000,
    975_000, 975_000, 1_000_000, 1_000_000, 1_025_000, 1_025_000,
    1_075_000, 1_075_000, 1_100_000, 1_100_000, 1_125_000, 1_125_000,
    1_125_000, 1_137_500, 1_150_000, 1_175_000, 1_200_000, 1_250_000,
    1_275_000, 1_300_000, 1_325_000,
];

pub const CPU_VREG: VregLimits = VregLimits {
    core: 1_350_000,
    mem: 1_150_000,
    dig: 1_150_000,
    hfpll_a: 2_100_000,
    hfpll_b: 1_800_000,
};

pub const L2_VREG: VregLimits = VregLimits {
    core: 0,
    mem: 0,
    dig: 0,
    hfpll_a: 2_100_000,
    hfpll_b: 1_800_000,
};

pub static BOARD: Board = Board {
    name: "msm8960",
    l2_levels: &L2_LEVELS,
    slow: &SLOW,
    nominal: &NOMINAL,
    fast: &FAST,
    bw_tiers_mbps: &[
        640, 1064, 1600, 2128, 3200, 3600, 3936, 4264, 4480, 4800, 5200,
    ],
    vmin_errata_midrs: &[0x511F_04D0, 0x511F_04D1, 0x510F_06F0],
    cpu_vreg: CPU_VREG,
    l2_vreg: L2_VREG,
};

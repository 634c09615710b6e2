/// Patches of the defect-repairing dataset the results report looks at.
const TARGET_IDS: [&str; 139] = [
    "1", "2", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17", "18",
    "19", "20", "21", "22", "23", "24", "25", "26", "27", "28", "29", "30", "31", "32", "33", "34",
    "36", "37", "38", "44", "45", "46", "47", "48", "49", "51", "53", "54", "55", "58", "59", "62",
    "63", "64", "65", "66", "67", "68", "69", "72", "73", "74", "75", "76", "77", "78", "79", "80",
    "81", "82", "83", "84", "88", "89", "90", "91", "92", "93", "150", "151", "152", "153", "154",
    "155", "157", "158", "159", "160", "161", "162", "163", "165", "166", "167", "168", "169",
    "170", "171", "172", "173", "174", "175", "176", "177", "180", "181", "182", "183", "184",
    "185", "186", "187", "188", "189", "191", "192", "193", "194", "195", "196", "197", "198",
    "199", "201", "202", "203", "204", "205", "206", "207", "208", "209", "210", "HDRepair1",
    "HDRepair3", "HDRepair4", "HDRepair5", "HDRepair6", "HDRepair7", "HDRepair8", "HDRepair9",
    "HDRepair10",
];

/// Projects summarized individually, before the overall total.
pub const PROJECTS: [&str; 4] = ["Chart", "Lang", "Math", "Time"];

pub fn target_patches() -> Vec<String> {
    TARGET_IDS.iter().map(|id| format!("Patch{}", id)).collect()
}

#[test]
fn target_patch_names() {
    let patches = target_patches();
    assert_eq!(patches.len(), 139);
    assert_eq!(patches[0], "Patch1");
    assert!(!patches.contains(&"Patch3".to_string()));
    assert_eq!(patches.last().unwrap(), "PatchHDRepair10");
}

//! MetaCentrum submission fields
//!
//! The field set offered by the MetaCentrum `qsub` assembler, in the order the
//! form shows them and the command lists them. Labels carry English and Czech.

use super::fields::{
    AttributeListField, AttributeSelectField, CountField, FieldCategory, FieldDescriptor,
    FieldType, FlagField, MemoryField, MultilingualText, PlaceField, QsubField, QueueField,
    ScratchMemoryField, ScratchTypeField, SelectStyle, SelectorFormat, SpecField, VnodeField,
    WalltimeField,
};
use crate::models::{MemoryAmount, SizeUnit};

fn basic(name: &str, field_type: FieldType, en: &str, cs: &str) -> FieldDescriptor {
    FieldDescriptor::new(
        name,
        field_type,
        MultilingualText::new(en, cs),
        FieldCategory::Basic,
    )
}

fn advanced(name: &str, field_type: FieldType, en: &str, cs: &str) -> FieldDescriptor {
    FieldDescriptor::new(
        name,
        field_type,
        MultilingualText::new(en, cs),
        FieldCategory::Advanced,
    )
}

/// Create the MetaCentrum field set
pub fn standard_fields() -> Vec<Box<dyn QsubField>> {
    let mut fields = basic_fields();
    fields.extend(advanced_fields());
    fields
}

fn basic_fields() -> Vec<Box<dyn QsubField>> {
    vec![
        Box::new(WalltimeField::new(
            basic("walltime", FieldType::Time, "Walltime", "Doba běhu")
                .required()
                .default_value("01:00:00")
                .description(MultilingualText::new(
                    "Maximum run time of the job (HH:MM:SS)",
                    "Maximální doba běhu úlohy (HH:MM:SS)",
                )),
        )),
        // Default is filled in per user from the accessible queues
        Box::new(QueueField::new(basic(
            "queue",
            FieldType::Select,
            "Queue",
            "Fronta",
        ))),
        Box::new(CountField::new(
            basic("ncpu", FieldType::Number, "CPU Count", "Počet CPU")
                .required()
                .default_value(1),
            "ncpus",
            SelectStyle::Clause,
            false,
        )),
        Box::new(MemoryField::new(
            basic("memory", FieldType::Memory, "RAM Memory", "RAM paměť")
                .default_value(MemoryAmount::new(400.0, SizeUnit::Mb)),
            "mem",
        )),
        Box::new(CountField::new(
            basic("ngpu", FieldType::Number, "GPU Count", "Počet GPU").default_value(0),
            "ngpus",
            SelectStyle::Continuation,
            true,
        )),
        Box::new(MemoryField::new(
            basic("gpu_memory", FieldType::Memory, "GPU Memory", "GPU paměť"),
            "gpu_mem",
        )),
        Box::new(ScratchTypeField::new(basic(
            "scratch_type",
            FieldType::Select,
            "Scratch Type",
            "Typ scratch úložiště",
        ))),
        Box::new(ScratchMemoryField::new(
            basic(
                "scratch_memory",
                FieldType::Memory,
                "Scratch Memory",
                "Scratch paměť",
            )
            .default_value(MemoryAmount::new(400.0, SizeUnit::Mb))
            .depends_on("scratch_type"),
        )),
        Box::new(
            AttributeSelectField::new(
                basic("cluster", FieldType::Select, "Cluster", "Cluster"),
                "cluster",
            )
            .with_format(SelectorFormat::ClusterFlag),
        ),
        Box::new(VnodeField::new(basic(
            "vnode",
            FieldType::Select,
            "Node (vnode)",
            "Uzel (vnode)",
        ))),
        Box::new(PlaceField::new(basic(
            "place",
            FieldType::Select,
            "Place/Location",
            "Místo/Lokace",
        ))),
    ]
}

fn advanced_fields() -> Vec<Box<dyn QsubField>> {
    vec![
        Box::new(AttributeSelectField::new(
            advanced("arch", FieldType::Select, "Architecture", "Architektura"),
            "arch",
        )),
        Box::new(AttributeListField::new(
            advanced("cgroups", FieldType::Multiselect, "Cgroups", "Cgroups"),
            "cgroups",
            SelectStyle::Clause,
        )),
        Box::new(AttributeListField::new(
            advanced("cpu_flag", FieldType::Multiselect, "CPU Flag", "Vlastnosti CPU"),
            "cpu_flag",
            SelectStyle::Clause,
        )),
        Box::new(AttributeSelectField::new(
            advanced("cpu_vendor", FieldType::Select, "CPU Vendor", "Výrobce CPU"),
            "cpu_vendor",
        )),
        // Extends the GPU selection rather than opening its own chunk
        Box::new(AttributeListField::new(
            advanced(
                "gpu_cap",
                FieldType::Multiselect,
                "GPU Capabilities",
                "Vlastnosti GPU",
            ),
            "gpu_cap",
            SelectStyle::Continuation,
        )),
        Box::new(AttributeListField::new(
            advanced(
                "host_licenses",
                FieldType::Multiselect,
                "Host Licenses",
                "Licence na uzlu",
            ),
            "host_licenses",
            SelectStyle::Clause,
        )),
        Box::new(AttributeSelectField::new(
            advanced("luna", FieldType::Select, "Luna", "Luna").description(
                MultilingualText::new(
                    "Luna cluster subdivision by year of purchase",
                    "Podrozdělení clusteru Luna podle roku pořízení",
                ),
            ),
            "luna",
        )),
        Box::new(AttributeSelectField::new(
            advanced("pbs_server", FieldType::Select, "PBS Server", "PBS Server"),
            "pbs_server",
        )),
        Box::new(FlagField::new(
            advanced("singularity", FieldType::Boolean, "Singularity", "Singularity")
                .default_value(false),
            "singularity",
        )),
        Box::new(SpecField::new(advanced(
            "spec",
            FieldType::Number,
            "SPEC",
            "SPEC",
        ))),
        Box::new(AttributeSelectField::new(
            advanced("osfamily", FieldType::Select, "OS Family", "Rodina OS"),
            "osfamily",
        )),
        Box::new(AttributeSelectField::new(
            advanced("os", FieldType::Select, "OS", "OS"),
            "os",
        )),
        Box::new(FlagField::new(
            advanced("umg", FieldType::Boolean, "UMG", "UMG").default_value(false),
            "umg",
        )),
    ]
}

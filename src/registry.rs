//! 控制器注册表
//!
//! 调用者持有的 core_id 到控制器的映射，用于平台胶水层按编号查找控制器。

use alloc::collections::BTreeMap;

use crate::dwc::Dwc3;

#[derive(Default)]
pub struct Dwc3Registry {
    controllers: BTreeMap<u32, Dwc3>,
}

impl Dwc3Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按控制器的 core_id 注册
    ///
    /// 编号已被占用时原样返回传入的控制器。
    pub fn insert(&mut self, dwc: Dwc3) -> Result<&mut Dwc3, Dwc3> {
        let id = dwc.core_id();
        if self.controllers.contains_key(&id) {
            warn!("DWC3: core id {} already registered", id);
            return Err(dwc);
        }
        Ok(self.controllers.entry(id).or_insert(dwc))
    }

    pub fn remove(&mut self, core_id: u32) -> Option<Dwc3> {
        self.controllers.remove(&core_id)
    }

    pub fn get(&self, core_id: u32) -> Option<&Dwc3> {
        self.controllers.get(&core_id)
    }

    pub fn get_mut(&mut self, core_id: u32) -> Option<&mut Dwc3> {
        self.controllers.get_mut(&core_id)
    }

    pub fn contains(&self, core_id: u32) -> bool {
        self.controllers.contains_key(&core_id)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Dwc3)> {
        self.controllers.iter().map(|(id, dwc)| (*id, dwc))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut Dwc3)> {
        self.controllers.iter_mut().map(|(id, dwc)| (*id, dwc))
    }
}

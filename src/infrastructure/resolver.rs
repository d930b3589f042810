//! 依赖图解析器
//!
//! 对"名称 -> 依赖名称列表"形式的图做拓扑排序与环路检测，
//! 服务容器与插件管理器共用。
//!
//! - 拓扑序：每个节点都排在其全部（传递）依赖之后
//! - 无依赖关系的节点按插入顺序稳定排列
//! - 环路：报告精确的环路径（首尾为同一节点）
//! - 缺失依赖：不在图中的依赖名不参与排序，由调用方决定如何处理

use crate::errors::DependencyError;
use std::collections::{BTreeMap, HashMap, HashSet};

/// DFS 三色标记（未访问即不在表中）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// 按插入顺序保存节点的依赖图
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点；同名节点只替换依赖，保留原有位置
    pub fn add_node<N, I, D>(&mut self, name: N, dependencies: I)
    where
        N: Into<String>,
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        let name = name.into();
        let deps: Vec<String> = dependencies.into_iter().map(Into::into).collect();
        if !self.edges.contains_key(&name) {
            self.nodes.push(name.clone());
        }
        self.edges.insert(name, deps);
    }

    /// 移除节点；指向它的边随之变为缺失依赖
    pub fn remove_node(&mut self, name: &str) -> bool {
        if self.edges.remove(name).is_none() {
            return false;
        }
        self.nodes.retain(|n| n != name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 直接依赖 `name` 的节点（按插入顺序）
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| self.dependencies_of(n).iter().any(|d| d == name))
            .map(String::as_str)
            .collect()
    }

    /// 所有 (依赖方, 缺失依赖名) 对
    pub fn missing_dependencies(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for node in &self.nodes {
            for dep in self.dependencies_of(node) {
                if !self.contains(dep) {
                    missing.push((node.clone(), dep.clone()));
                }
            }
        }
        missing
    }

    /// 计算拓扑序，遇到环路返回 `DependencyError::Cycle`
    pub fn order(&self) -> Result<Vec<String>, DependencyError> {
        self.try_order().map_err(|path| DependencyError::Cycle { path })
    }

    /// 环路检测，不计算顺序
    pub fn check_acyclic(&self) -> Result<(), DependencyError> {
        self.order().map(|_| ())
    }

    fn try_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
        let mut stack: Vec<&str> = Vec::new();
        let mut result = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            self.visit(node, &mut marks, &mut stack, &mut result)?;
        }

        Ok(result)
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        out: &mut Vec<String>,
    ) -> Result<(), Vec<String>> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(cycle_path(stack, node)),
            None => {}
        }

        marks.insert(node, Mark::InProgress);
        stack.push(node);

        for dep in self.dependencies_of(node) {
            if !self.contains(dep) {
                continue;
            }
            self.visit(dep, marks, stack, out)?;
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        out.push(node.to_string());
        Ok(())
    }

    /// 找出所有环路（诊断用），每条路径首尾相同
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for node in &self.nodes {
            if !visited.contains(node.as_str()) {
                self.dfs_cycle_detection(node, &mut visited, &mut rec_stack, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn dfs_cycle_detection<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for dep in self.dependencies_of(node) {
            if !self.contains(dep) {
                continue;
            }
            if !visited.contains(dep.as_str()) {
                self.dfs_cycle_detection(dep, visited, rec_stack, path, cycles);
            } else if rec_stack.contains(dep.as_str()) {
                cycles.push(cycle_path(path, dep));
            }
        }

        path.pop();
        rec_stack.remove(node);
    }
}

impl<N, D> FromIterator<(N, Vec<D>)> for DependencyGraph
where
    N: Into<String>,
    D: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, Vec<D>)>>(iter: T) -> Self {
        let mut graph = DependencyGraph::new();
        for (name, deps) in iter {
            graph.add_node(name, deps);
        }
        graph
    }
}

/// 从递归栈中截取环路：从重复节点首次出现处到栈顶，再补上重复节点
fn cycle_path(stack: &[&str], repeated: &str) -> Vec<String> {
    let start = stack.iter().position(|n| *n == repeated).unwrap_or(0);
    let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
    path.push(repeated.to_string());
    path
}

/// 分层排序结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TieredOrder {
    /// 可加载的顺序
    pub order: Vec<String>,
    /// 被剔除的环路（每条首尾相同）
    pub cycles: Vec<Vec<String>>,
}

impl TieredOrder {
    /// 名称是否落在某条被剔除的环路上
    pub fn in_cycle(&self, name: &str) -> Option<&[String]> {
        self.cycles
            .iter()
            .find(|cycle| cycle.iter().any(|n| n == name))
            .map(Vec::as_slice)
    }
}

/// 先按层级稳定分区，再在每个分区内独立拓扑排序，最后按层级拼接。
///
/// 跨分区的依赖边在分区内视为缺失依赖。分区内出现环路时，
/// 环上节点被剔除并记录，其余节点继续排序。
pub fn order_by_tiers<K, N, D>(entries: impl IntoIterator<Item = (K, N, Vec<D>)>) -> TieredOrder
where
    K: Ord,
    N: Into<String>,
    D: Into<String>,
{
    let mut tiers: BTreeMap<K, DependencyGraph> = BTreeMap::new();
    for (tier, name, deps) in entries {
        tiers.entry(tier).or_default().add_node(name, deps);
    }

    let mut result = TieredOrder::default();
    for (_, mut graph) in tiers {
        loop {
            match graph.try_order() {
                Ok(order) => {
                    result.order.extend(order);
                    break;
                }
                Err(path) => {
                    for name in &path {
                        graph.remove_node(name);
                    }
                    result.cycles.push(path);
                }
            }
        }
    }
    result
}

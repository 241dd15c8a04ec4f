/// Single-page viewer: node grid, choropleth, cluster buttons, U-Matrix toggle
/// and the summary table. All selection logic runs server-side; the page only
/// posts events and redraws from the returned snapshot.
pub const DASHBOARD_HTML: &str = r##"
<!doctype html>
<html lang="en">

<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>SOM Dashboard</title>
  <style>
    body { font-family: ui-sans-serif, system-ui, sans-serif; margin: 0; background: #f7f7f7; color: #222; }
    header { padding: 12px 20px; background: #1f2937; color: #f9fafb; }
    header h1 { margin: 0; font-size: 1.2rem; }
    #status { font-size: 0.8rem; opacity: 0.7; }
    .controls { display: flex; flex-wrap: wrap; gap: 8px; align-items: center; padding: 10px 20px; }
    .controls button { border: 1px solid #555; border-radius: 4px; padding: 6px 12px; cursor: pointer; color: #fff; font-weight: 600; }
    .controls label { margin-left: 16px; user-select: none; }
    .panels { display: grid; grid-template-columns: 1fr 1fr; gap: 12px; padding: 0 20px; }
    .panel { background: #fff; border: 1px solid #ddd; border-radius: 6px; padding: 8px; }
    .panel h2 { font-size: 1rem; margin: 4px 0 8px; }
    svg { width: 100%; height: 460px; }
    svg path { cursor: pointer; }
    .legend { display: flex; flex-wrap: wrap; gap: 10px; font-size: 0.8rem; margin-top: 6px; }
    .legend span.swatch { display: inline-block; width: 12px; height: 12px; margin-right: 4px; vertical-align: middle; }
    .ramp { height: 12px; width: 100%; }
    table { border-collapse: collapse; margin: 12px 20px 24px; font-size: 0.85rem; }
    th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: right; }
    tr.selected td { background: #fde68a; }
  </style>
</head>

<body>
  <header>
    <h1 id="title">SOM Dashboard</h1>
    <div id="status">loading…</div>
  </header>
  <div class="controls" id="controls"></div>
  <div class="panels">
    <div class="panel">
      <h2 id="node-title"></h2>
      <svg id="nodes"></svg>
      <div class="legend" id="cluster-legend"></div>
      <div id="umatrix-legend" style="display:none">
        <canvas class="ramp" id="ramp" width="256" height="12"></canvas>
        <div class="legend"><span id="u-low"></span><span style="flex:1"></span><span id="u-high"></span></div>
      </div>
    </div>
    <div class="panel">
      <h2 id="region-title"></h2>
      <svg id="regions"></svg>
    </div>
  </div>
  <table id="summary">
    <thead></thead>
    <tbody></tbody>
  </table>

  <script>
    const SVG_NS = "http://www.w3.org/2000/svg";
    const UNSELECTED_ALPHA = 0.2;
    let views = null;
    let sessionId = null;
    let nodePaths = [];
    let regionPaths = [];
    let tableRows = [];

    function hexPoints(cx, cy, size, orientation) {
      const pts = [];
      const start = orientation === "pointy_top" ? Math.PI / 6 : 0;
      for (let k = 0; k < 6; k++) {
        const angle = start + Math.PI / 3 * k;
        pts.push([cx + size * Math.cos(angle), cy + size * Math.sin(angle)]);
      }
      return pts;
    }

    function pathFrom(rings) {
      return rings.map(ring => "M" + ring.map(p => p[0] + "," + p[1]).join("L") + "Z").join("");
    }

    function selectionMode(ev) {
      return ev.shiftKey || ev.ctrlKey || ev.metaKey;
    }

    function toggleIndex(current, index, additive) {
      if (!additive) return [index];
      const out = current.filter(i => i !== index);
      if (out.length === current.length) out.push(index);
      return out.sort((a, b) => a - b);
    }

    let current = { nodes: [], regions: [], table: [] };

    async function postEvent(event) {
      const resp = await fetch(`/api/sessions/${sessionId}/events`, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(event),
      });
      if (resp.status === 404) {
        await openSession();
        return;
      }
      if (!resp.ok) {
        document.getElementById("status").textContent = `event failed: ${resp.status}`;
        return;
      }
      applySnapshot(await resp.json());
    }

    function renderNodes() {
      const svg = document.getElementById("nodes");
      const size = views.nodes.hex_size;
      let minX = Infinity, minY = Infinity, maxX = -Infinity, maxY = -Infinity;
      for (const rec of views.nodes.records) {
        const [cx, cy] = rec.center;
        const pts = hexPoints(cx, -cy, size, views.nodes.orientation);
        for (const [x, y] of pts) {
          minX = Math.min(minX, x); maxX = Math.max(maxX, x);
          minY = Math.min(minY, y); maxY = Math.max(maxY, y);
        }
        const path = document.createElementNS(SVG_NS, "path");
        path.setAttribute("d", pathFrom([pts]));
        path.setAttribute("stroke-width", 0.08);
        const title = document.createElementNS(SVG_NS, "title");
        title.textContent = `node (${rec.bmu_x}, ${rec.bmu_y}) cluster ${rec.hc_cluster} u=${rec.u_value.toFixed(3)}`;
        path.appendChild(title);
        path.addEventListener("click", ev => {
          postEvent({ kind: "node_selection", indices: toggleIndex(current.nodes, rec.index, selectionMode(ev)) });
        });
        svg.appendChild(path);
        nodePaths.push(path);
      }
      svg.setAttribute("viewBox", `${minX} ${minY} ${maxX - minX} ${maxY - minY}`);
      document.getElementById("node-title").textContent = views.nodes.title;
    }

    function renderRegions() {
      const svg = document.getElementById("regions");
      const b = views.regions.bounds;
      if (b) {
        const pad = Math.max(b[2] - b[0], b[3] - b[1]) * 0.02;
        svg.setAttribute("viewBox", `${b[0] - pad} ${-b[3] - pad} ${b[2] - b[0] + 2 * pad} ${b[3] - b[1] + 2 * pad}`);
      }
      const stroke = b ? Math.max(b[2] - b[0], b[3] - b[1]) / 800 : 0.01;
      for (const rec of views.regions.records) {
        const rings = rec.polygons.flat().map(ring => ring.map(([x, y]) => [x, -y]));
        const path = document.createElementNS(SVG_NS, "path");
        path.setAttribute("d", pathFrom(rings));
        path.setAttribute("fill-rule", "evenodd");
        path.setAttribute("stroke-width", stroke);
        const title = document.createElementNS(SVG_NS, "title");
        title.textContent = `region ${rec.index} cluster ${rec.hc_cluster}`;
        path.appendChild(title);
        path.addEventListener("click", ev => {
          postEvent({ kind: "region_selection", indices: toggleIndex(current.regions, rec.index, selectionMode(ev)) });
        });
        svg.appendChild(path);
        regionPaths.push(path);
      }
      document.getElementById("region-title").textContent = views.regions.title;
    }

    function renderControls() {
      const controls = document.getElementById("controls");
      for (const button of views.buttons) {
        const el = document.createElement("button");
        el.textContent = button.label;
        el.className = button.css_class;
        el.style.background = button.color;
        el.addEventListener("click", () => postEvent({ kind: "cluster_button", cluster: button.cluster }));
        controls.appendChild(el);
      }
      const label = document.createElement("label");
      const box = document.createElement("input");
      box.type = "checkbox";
      box.checked = views.toggle.active;
      box.addEventListener("change", () => postEvent({ kind: "toggle_umatrix", active: box.checked }));
      label.appendChild(box);
      label.appendChild(document.createTextNode(" " + views.toggle.label));
      controls.appendChild(label);
    }

    function renderLegends() {
      const legend = document.getElementById("cluster-legend");
      for (const entry of views.nodes.cluster_legend) {
        const item = document.createElement("span");
        const swatch = document.createElement("span");
        swatch.className = "swatch";
        swatch.style.background = entry.color;
        item.appendChild(swatch);
        item.appendChild(document.createTextNode(entry.label));
        legend.appendChild(item);
      }
      const mapper = views.nodes.umatrix_legend;
      const ctx = document.getElementById("ramp").getContext("2d");
      mapper.palette.forEach((color, i) => {
        ctx.fillStyle = color;
        ctx.fillRect(i * 256 / mapper.palette.length, 0, 256 / mapper.palette.length + 1, 12);
      });
      document.getElementById("u-low").textContent = mapper.low.toFixed(3);
      document.getElementById("u-high").textContent = mapper.high.toFixed(3);
    }

    function renderSummary() {
      const head = document.querySelector("#summary thead");
      const body = document.querySelector("#summary tbody");
      const cols = ["cluster", "observations", ...views.summary.columns];
      const headRow = document.createElement("tr");
      for (const col of cols) {
        const th = document.createElement("th");
        th.textContent = col;
        headRow.appendChild(th);
      }
      head.appendChild(headRow);
      views.summary.rows.forEach(row => {
        const tr = document.createElement("tr");
        const cells = [row.cluster, row.observations, ...row.means.map(v => v.toFixed(3))];
        for (const cell of cells) {
          const td = document.createElement("td");
          td.textContent = String(cell);
          tr.appendChild(td);
        }
        body.appendChild(tr);
        tableRows.push(tr);
      });
    }

    function paint(paths, colors, selected) {
      const chosen = new Set(selected);
      const dim = chosen.size > 0;
      paths.forEach((path, i) => {
        const on = chosen.has(i);
        path.setAttribute("fill", colors[i]);
        path.setAttribute("fill-opacity", dim && !on ? UNSELECTED_ALPHA : 1);
        path.setAttribute("stroke", on ? "#000" : "#fff");
      });
    }

    function applySnapshot(snap) {
      current = { nodes: snap.nodes, regions: snap.regions, table: snap.table };
      paint(nodePaths, snap.display_colors, snap.nodes);
      paint(regionPaths, views.regions.records.map(r => r.color), snap.regions);
      const rows = new Set(snap.table);
      tableRows.forEach((tr, i) => tr.classList.toggle("selected", rows.has(i)));
      document.getElementById("cluster-legend").style.display = snap.cluster_legend_visible ? "flex" : "none";
      document.getElementById("umatrix-legend").style.display = snap.umatrix_legend_visible ? "block" : "none";
    }

    async function openSession() {
      const resp = await fetch("/api/sessions", { method: "POST" });
      const created = await resp.json();
      sessionId = created.id;
      document.getElementById("status").textContent = `session ${sessionId}`;
      applySnapshot(created.snapshot);
    }

    async function main() {
      views = await (await fetch("/api/views")).json();
      document.getElementById("title").textContent = views.title;
      document.title = views.title;
      renderControls();
      renderNodes();
      renderRegions();
      renderLegends();
      renderSummary();
      await openSession();
      window.addEventListener("pagehide", () => {
        if (sessionId) fetch(`/api/sessions/${sessionId}`, { method: "DELETE", keepalive: true });
      });
    }

    main().catch(err => {
      document.getElementById("status").textContent = `failed to load dashboard: ${err}`;
    });
  </script>
</body>

</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_writes_data_as_text_only() {
        assert!(!DASHBOARD_HTML.contains("innerHTML"));
        assert!(DASHBOARD_HTML.contains("textContent = col"));
    }

    #[test]
    fn page_draws_both_tile_orientations() {
        let orientation = serde_json::to_value(::dashboard::HexOrientation::PointyTop).unwrap();
        assert_eq!(orientation, "pointy_top");
        assert!(DASHBOARD_HTML.contains("\"pointy_top\""));
    }
}
